use devmetrics_dto::proto::dev_metrics_client::DevMetricsClient;
use devmetrics_dto::proto::metric::Type as WireType;
use devmetrics_dto::proto::{Counter, Gauge, Metric as WireMetric, UpsertMetricsRequest};
use devmetrics_dto::{Metric, MetricKind};
use tokio::sync::Mutex;
use tonic::transport::Channel;

use super::Dispatcher;

/// gRPC dispatcher: builds an `UpsertMetricsRequest` from the same snapshot the HTTP path
/// sends, with no signing or encryption applied (spec §4.2 gRPC path / §9 Open Question,
/// resolved for this transport in the collector's own grounding ledger).
pub struct GrpcDispatcher {
    client: Mutex<DevMetricsClient<Channel>>,
    logger: slog::Logger,
}

impl GrpcDispatcher {
    pub async fn connect(grpc_address: &str, logger: slog::Logger) -> anyhow::Result<Self> {
        let endpoint = format!("http://{grpc_address}");
        let client = DevMetricsClient::connect(endpoint).await?;
        Ok(Self {
            client: Mutex::new(client),
            logger,
        })
    }
}

fn to_wire(metric: &Metric) -> WireMetric {
    let r#type = match metric.kind {
        MetricKind::Gauge => WireType::Gauge(Gauge {
            id: metric.id.clone(),
            value: metric.value.unwrap_or_default(),
        }),
        MetricKind::Counter => WireType::Counter(Counter {
            id: metric.id.clone(),
            delta: metric.delta.unwrap_or_default(),
        }),
    };
    WireMetric { r#type: Some(r#type) }
}

#[async_trait::async_trait]
impl Dispatcher for GrpcDispatcher {
    async fn dispatch(&self, metrics: &[Metric]) -> anyhow::Result<()> {
        let request = UpsertMetricsRequest {
            metrics: metrics.iter().map(to_wire).collect(),
        };

        let mut client = self.client.lock().await;
        let response = client.update_metrics(request).await?;
        slog::info!(self.logger, "dispatched batch"; "status" => response.into_inner().status);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_converts_to_the_gauge_oneof_variant() {
        let wire = to_wire(&Metric::gauge("Alloc", 42.5));
        assert!(matches!(wire.r#type, Some(WireType::Gauge(_))));
    }

    #[test]
    fn counter_converts_to_the_counter_oneof_variant() {
        let wire = to_wire(&Metric::counter("PollCount", 3));
        assert!(matches!(wire.r#type, Some(WireType::Counter(_))));
    }
}
