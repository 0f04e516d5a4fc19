use std::sync::Arc;

use devmetrics_dto::proto::dev_metrics_server::DevMetrics;
use devmetrics_dto::proto::metric::Type as WireType;
use devmetrics_dto::proto::upsert_metrics_response::Status as UpsertStatus;
use devmetrics_dto::proto::{UpsertMetricsRequest, UpsertMetricsResponse};
use devmetrics_dto::Metric;
use devmetrics_storage::Repository;
use tonic::{Request, Response, Status};

/// gRPC ingress for `DevMetrics.UpdateMetrics` (spec §6). Unlike the HTTP path this omits
/// per-metric signing and decryption: the Open Question in spec §9 is resolved here as option
/// (b) — gRPC is documented as an inherently-trusted transport, so a batch that reaches this
/// service is applied to storage unconditionally once it passes the tag-union check below.
pub struct GrpcService {
    repo: Arc<dyn Repository>,
    logger: slog::Logger,
}

impl GrpcService {
    pub fn new(repo: Arc<dyn Repository>, logger: slog::Logger) -> Self {
        Self { repo, logger }
    }
}

#[tonic::async_trait]
impl DevMetrics for GrpcService {
    async fn update_metrics(
        &self,
        request: Request<UpsertMetricsRequest>,
    ) -> Result<Response<UpsertMetricsResponse>, Status> {
        let metrics = request.into_inner().metrics;

        if metrics.is_empty() {
            return Err(Status::data_loss("empty metrics batch"));
        }

        let mut envelopes = Vec::with_capacity(metrics.len());
        for metric in metrics {
            match metric.r#type {
                Some(WireType::Gauge(g)) => envelopes.push(Metric::gauge(g.id, g.value)),
                Some(WireType::Counter(c)) => envelopes.push(Metric::counter(c.id, c.delta)),
                None => {
                    return Err(Status::invalid_argument(
                        "metric carries neither a gauge nor a counter",
                    ))
                }
            }
        }

        self.repo.set_batch(&envelopes).await.map_err(|e| {
            slog::error!(self.logger, "gRPC set_batch failed"; "error" => %e);
            Status::internal(e.to_string())
        })?;

        Ok(Response::new(UpsertMetricsResponse {
            status: UpsertStatus::Ok as i32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmetrics_dto::proto::{Counter, Gauge, Metric as WireMetric};
    use devmetrics_storage::MemoryRepository;
    use std::time::Duration;

    fn test_service() -> GrpcService {
        GrpcService::new(
            Arc::new(MemoryRepository::new(
                "",
                Duration::ZERO,
                false,
                slog::Logger::root(slog::Discard, slog::o!()),
            )),
            slog::Logger::root(slog::Discard, slog::o!()),
        )
    }

    #[tokio::test]
    async fn empty_request_is_data_loss() {
        let service = test_service();
        let err = service
            .update_metrics(Request::new(UpsertMetricsRequest { metrics: vec![] }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::DataLoss);
    }

    #[tokio::test]
    async fn untagged_metric_is_invalid_argument() {
        let service = test_service();
        let request = UpsertMetricsRequest {
            metrics: vec![WireMetric { r#type: None }],
        };
        let err = service
            .update_metrics(Request::new(request))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn applies_a_mixed_batch_to_storage() {
        let service = test_service();
        let request = UpsertMetricsRequest {
            metrics: vec![
                WireMetric {
                    r#type: Some(WireType::Gauge(Gauge {
                        id: "Alloc".to_string(),
                        value: 42.5,
                    })),
                },
                WireMetric {
                    r#type: Some(WireType::Counter(Counter {
                        id: "PollCount".to_string(),
                        delta: 1,
                    })),
                },
            ],
        };

        let response = service
            .update_metrics(Request::new(request))
            .await
            .unwrap();
        assert_eq!(response.into_inner().status, UpsertStatus::Ok as i32);
        assert_eq!(service.repo.get_gauge("Alloc").await.unwrap(), Some(42.5));
        assert_eq!(service.repo.get_counter("PollCount").await.unwrap(), Some(1));
    }
}
