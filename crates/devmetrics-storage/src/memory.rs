use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devmetrics_dto::{Metric, MetricKind};
use parking_lot::RwLock;
use slog::{debug, info, o, warn};
use tokio::task::JoinHandle;

use crate::error::StorageError;
use crate::repository::{MetricsSnapshot, Repository};

#[derive(Debug, Default)]
struct MetricMaps {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// In-memory `Repository` backed by a readers-writer lock, with an optional JSON snapshot
/// file for persistence across restarts (spec §4.4 "Memory variant").
pub struct MemoryRepository {
    maps: Arc<RwLock<MetricMaps>>,
    store_file: String,
    store_interval: Duration,
    restore: bool,
    logger: slog::Logger,
    ticker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MemoryRepository {
    pub fn new(
        store_file: impl Into<String>,
        store_interval: Duration,
        restore: bool,
        logger: slog::Logger,
    ) -> Self {
        Self {
            maps: Arc::new(RwLock::new(MetricMaps::default())),
            store_file: store_file.into(),
            store_interval,
            restore,
            logger: logger.new(o!("component" => "memory-repository")),
            ticker: tokio::sync::Mutex::new(None),
        }
    }

    fn dumping_enabled(&self) -> bool {
        !self.store_file.is_empty()
    }

    /// Applies a batch of envelopes to the in-memory maps: counters aggregate left-to-right,
    /// gauges take the last value seen (spec §4.4/§5). Does not touch the snapshot file;
    /// callers decide whether a dump follows.
    fn apply_locked(&self, metrics: &[Metric]) -> Result<(), StorageError> {
        let mut maps = self.maps.write();
        for metric in metrics {
            metric.validate()?;
            match metric.kind {
                MetricKind::Gauge => {
                    maps.gauges
                        .insert(metric.id.clone(), metric.value.expect("validated"));
                }
                MetricKind::Counter => {
                    let delta = metric.delta.expect("validated");
                    *maps.counters.entry(metric.id.clone()).or_insert(0) += delta;
                }
            }
        }
        Ok(())
    }

    async fn maybe_sync_dump(&self) -> Result<(), StorageError> {
        if self.store_interval.is_zero() {
            self.dump().await?;
        }
        Ok(())
    }

    async fn dump(&self) -> Result<(), StorageError> {
        if !self.dumping_enabled() {
            return Ok(());
        }

        let metrics = {
            let maps = self.maps.read();
            let snapshot = MetricsSnapshot {
                gauges: maps
                    .gauges
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect(),
                counters: maps
                    .counters
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect(),
            };
            snapshot.into_metrics()
        };

        let json = serde_json::to_vec(&metrics).map_err(|source| StorageError::SnapshotDecode {
            path: self.store_file.clone(),
            source,
        })?;

        tokio::fs::write(&self.store_file, json)
            .await
            .map_err(|source| StorageError::SnapshotWrite {
                path: self.store_file.clone(),
                source,
            })?;

        debug!(self.logger, "dumped snapshot"; "count" => metrics.len(), "file" => &self.store_file);
        Ok(())
    }

    async fn restore(&self) -> Result<(), StorageError> {
        if !self.restore || !self.dumping_enabled() {
            return Ok(());
        }

        let bytes = match tokio::fs::read(&self.store_file).await {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                info!(self.logger, "no prior snapshot file, starting empty"; "file" => &self.store_file);
                return Ok(());
            }
            Err(source) => {
                return Err(StorageError::SnapshotRead {
                    path: self.store_file.clone(),
                    source,
                })
            }
        };

        if bytes.is_empty() {
            return Ok(());
        }

        let metrics: Vec<Metric> =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::SnapshotDecode {
                path: self.store_file.clone(),
                source,
            })?;

        self.apply_locked(&metrics)?;
        info!(self.logger, "restored snapshot"; "count" => metrics.len(), "file" => &self.store_file);
        Ok(())
    }

    fn spawn_dump_ticker(&self) -> Option<JoinHandle<()>> {
        if self.store_interval.is_zero() || !self.dumping_enabled() {
            return None;
        }

        let maps = self.maps.clone();
        let store_file = self.store_file.clone();
        let interval = self.store_interval;
        let logger = self.logger.clone();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let metrics = {
                    let maps = maps.read();
                    let snapshot = MetricsSnapshot {
                        gauges: maps.gauges.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                        counters: maps.counters.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                    };
                    snapshot.into_metrics()
                };

                let json = match serde_json::to_vec(&metrics) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(logger, "failed to encode snapshot"; "error" => %err);
                        continue;
                    }
                };

                if let Err(err) = tokio::fs::write(&store_file, json).await {
                    warn!(logger, "failed to dump snapshot"; "error" => %err, "file" => &store_file);
                }
            }
        }))
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn store_gauge(&self, id: &str, value: f64) -> Result<(), StorageError> {
        self.apply_locked(&[Metric::gauge(id, value)])?;
        self.maybe_sync_dump().await
    }

    async fn store_counter(&self, id: &str, delta: i64) -> Result<(), StorageError> {
        self.apply_locked(&[Metric::counter(id, delta)])?;
        self.maybe_sync_dump().await
    }

    async fn get_gauge(&self, id: &str) -> Result<Option<f64>, StorageError> {
        Ok(self.maps.read().gauges.get(id).copied())
    }

    async fn get_counter(&self, id: &str) -> Result<Option<i64>, StorageError> {
        Ok(self.maps.read().counters.get(id).copied())
    }

    async fn get_all(&self) -> Result<MetricsSnapshot, StorageError> {
        let maps = self.maps.read();
        Ok(MetricsSnapshot {
            gauges: maps.gauges.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            counters: maps.counters.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        })
    }

    async fn set_batch(&self, metrics: &[Metric]) -> Result<(), StorageError> {
        self.apply_locked(metrics)?;
        self.maybe_sync_dump().await
    }

    async fn on_start(&self) -> Result<(), StorageError> {
        self.restore().await?;
        let handle = self.spawn_dump_ticker();
        *self.ticker.lock().await = handle;
        Ok(())
    }

    async fn on_close(&self) -> Result<(), StorageError> {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
        self.dump().await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::Drain;

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard.fuse(), o!())
    }

    #[tokio::test]
    async fn store_and_get_gauge_round_trips() {
        let repo = MemoryRepository::new("", Duration::ZERO, false, test_logger());
        repo.store_gauge("Alloc", 42.5).await.unwrap();
        assert_eq!(repo.get_gauge("Alloc").await.unwrap(), Some(42.5));
        assert_eq!(repo.get_gauge("Missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_counter_is_additive() {
        let repo = MemoryRepository::new("", Duration::ZERO, false, test_logger());
        repo.store_counter("PollCount", 1).await.unwrap();
        repo.store_counter("PollCount", 1).await.unwrap();
        assert_eq!(repo.get_counter("PollCount").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn set_batch_aggregates_counters_left_to_right() {
        let repo = MemoryRepository::new("", Duration::ZERO, false, test_logger());
        let batch = vec![
            Metric::counter("PollCount", 1),
            Metric::counter("PollCount", 1),
            Metric::gauge("Alloc", 1.0),
            Metric::gauge("Alloc", 2.0),
        ];
        repo.set_batch(&batch).await.unwrap();
        assert_eq!(repo.get_counter("PollCount").await.unwrap(), Some(2));
        assert_eq!(repo.get_gauge("Alloc").await.unwrap(), Some(2.0));
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let path_str = path.to_str().unwrap().to_string();

        {
            let repo =
                MemoryRepository::new(path_str.clone(), Duration::ZERO, false, test_logger());
            repo.store_gauge("Alloc", 42.5).await.unwrap();
            repo.store_counter("PollCount", 7).await.unwrap();
            repo.on_close().await.unwrap();
        }

        let repo = MemoryRepository::new(path_str, Duration::ZERO, true, test_logger());
        repo.on_start().await.unwrap();
        assert_eq!(repo.get_gauge("Alloc").await.unwrap(), Some(42.5));
        assert_eq!(repo.get_counter("PollCount").await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn missing_snapshot_file_is_treated_as_empty_state() {
        let repo = MemoryRepository::new(
            "/tmp/devmetrics-test-does-not-exist.json",
            Duration::ZERO,
            true,
            test_logger(),
        );
        repo.on_start().await.unwrap();
        assert_eq!(repo.get_gauge("Alloc").await.unwrap(), None);
    }
}
