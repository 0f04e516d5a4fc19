pub mod grpc;
pub mod http;

use devmetrics_dto::Metric;

/// Ships one signed snapshot to the collector. Implemented once per wire protocol (spec
/// §4.2); the dispatcher never retries or queues a failed send — the next tick produces a
/// fresh snapshot instead.
#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, metrics: &[Metric]) -> anyhow::Result<()>;
}
