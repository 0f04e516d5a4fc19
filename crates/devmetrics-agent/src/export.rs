use devmetrics_crypto::Signer;
use devmetrics_dto::Metric;

/// Signs a registry snapshot for dispatch: a first-class capability parameter rather than a
/// closure captured ad hoc at the call site (§9 design note), keeping the registry free of
/// transport and crypto knowledge.
pub fn sign_snapshot(metrics: Vec<Metric>, signer: &dyn Signer) -> Vec<Metric> {
    metrics
        .into_iter()
        .map(|metric| {
            let hash = signer.sign(&metric);
            if hash.is_empty() {
                metric
            } else {
                metric.with_hash(hash)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmetrics_crypto::{Hasher, HmacSigner, Sha256Hasher};

    #[test]
    fn empty_key_signer_leaves_metrics_unhashed() {
        let signer = HmacSigner::new(Sha256Hasher::new(), "");
        let signed = sign_snapshot(vec![Metric::counter("PollCount", 1)], &signer);
        assert_eq!(signed[0].hash, None);
    }

    #[test]
    fn configured_key_attaches_a_verifiable_hash() {
        let signer = HmacSigner::new(Sha256Hasher::new(), "secret");
        let signed = sign_snapshot(vec![Metric::counter("PollCount", 1)], &signer);
        let hash = signed[0].hash.clone().unwrap();
        assert_eq!(
            hash,
            Sha256Hasher::new().hash("PollCount:counter:1", "secret")
        );
    }
}
