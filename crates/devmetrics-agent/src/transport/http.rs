use std::io::Write;
use std::time::Duration;

use devmetrics_crypto::RsaPublicKey;
use devmetrics_dto::Metric;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::Dispatcher;

/// HTTP dispatcher: JSON-encode, optionally RSA-encrypt, gzip, POST to `{base}/updates/`
/// (spec §4.2 HTTP path).
pub struct HttpDispatcher {
    client: reqwest::Client,
    endpoint: String,
    crypto_key: Option<RsaPublicKey>,
    local_ip: String,
    logger: slog::Logger,
}

impl HttpDispatcher {
    pub fn new(server_address: &str, crypto_key: Option<RsaPublicKey>, logger: slog::Logger) -> Self {
        let local_ip = local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| "127.0.0.1".to_string());

        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("building the reqwest client never fails with no custom TLS config"),
            endpoint: format!("http://{server_address}/updates/"),
            crypto_key,
            local_ip,
            logger,
        }
    }

    fn encode_body(&self, metrics: &[Metric]) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_vec(metrics)?;

        let payload = match &self.crypto_key {
            Some(key) => devmetrics_crypto::encrypt(&json, key)?,
            None => json,
        };

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload)?;
        Ok(encoder.finish()?)
    }
}

#[async_trait::async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, metrics: &[Metric]) -> anyhow::Result<()> {
        let body = self.encode_body(metrics)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Content-Encoding", "gzip")
            .header("X-Real-IP", &self.local_ip)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        slog::info!(self.logger, "dispatched batch"; "status" => status.as_u16(), "body" => text);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_body_without_a_key_is_plain_gzip() {
        let dispatcher = HttpDispatcher::new(
            "127.0.0.1:8080",
            None,
            slog::Logger::root(slog::Discard, slog::o!()),
        );
        let metrics = vec![Metric::counter("PollCount", 1)];
        let body = dispatcher.encode_body(&metrics).unwrap();
        assert!(!body.is_empty());

        let mut decoder = flate2::read::GzDecoder::new(&body[..]);
        let mut decoded = String::new();
        std::io::Read::read_to_string(&mut decoder, &mut decoded).unwrap();
        assert!(decoded.contains("PollCount"));
    }
}
