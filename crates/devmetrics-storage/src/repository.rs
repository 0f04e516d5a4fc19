use async_trait::async_trait;
use devmetrics_dto::Metric;

use crate::error::StorageError;

/// A read-consistent enumeration of every stored gauge and counter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub gauges: Vec<(String, f64)>,
    pub counters: Vec<(String, i64)>,
}

impl MetricsSnapshot {
    /// Flattens the snapshot into wire envelopes, the shape the snapshot file and the
    /// `GET /` listing both consume.
    pub fn into_metrics(self) -> Vec<Metric> {
        let mut out = Vec::with_capacity(self.gauges.len() + self.counters.len());
        out.extend(self.gauges.into_iter().map(|(id, v)| Metric::gauge(id, v)));
        out.extend(
            self.counters
                .into_iter()
                .map(|(id, d)| Metric::counter(id, d)),
        );
        out
    }
}

/// The uniform storage surface handlers program against (spec §4.4). Both the in-memory and
/// the PostgreSQL backends implement this trait; handlers never know which one they're talking
/// to.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Last-writer-wins.
    async fn store_gauge(&self, id: &str, value: f64) -> Result<(), StorageError>;

    /// Additive: the stored value becomes `existing + delta`.
    async fn store_counter(&self, id: &str, delta: i64) -> Result<(), StorageError>;

    async fn get_gauge(&self, id: &str) -> Result<Option<f64>, StorageError>;

    async fn get_counter(&self, id: &str) -> Result<Option<i64>, StorageError>;

    async fn get_all(&self) -> Result<MetricsSnapshot, StorageError>;

    /// Batched idempotent upsert. Counters within `metrics` aggregate left-to-right before
    /// commit (spec §5's ordering guarantee); gauges within the same batch take the last
    /// value seen for a given id.
    async fn set_batch(&self, metrics: &[Metric]) -> Result<(), StorageError>;

    async fn on_start(&self) -> Result<(), StorageError>;

    async fn on_close(&self) -> Result<(), StorageError>;

    /// Liveness check backing `GET /ping` (spec §6). The memory backend has nothing to
    /// probe and always succeeds; the PostgreSQL backend round-trips a query against the pool.
    async fn ping(&self) -> Result<(), StorageError>;
}
