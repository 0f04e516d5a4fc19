use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use devmetrics_dto::{Metric, MetricKind};
use slog::{debug, info, o};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::error::StorageError;
use crate::repository::{MetricsSnapshot, Repository};

/// How often the connection-pool-stats logger ticks (spec §4.4 "connection-pool-stats logger").
const POOL_STAT_INTERVAL: Duration = Duration::from_secs(30);

const UPSERT_METRIC: &str = "\
    INSERT INTO metrics (id, type, delta, value) \
    VALUES ($1, $2, $3, $4) \
    ON CONFLICT (id, type) DO UPDATE \
    SET type = $2, delta = $3, value = $4";

/// PostgreSQL-backed `Repository` (spec §4.4 "SQL variant").
pub struct PostgresRepository {
    pool: PgPool,
    logger: slog::Logger,
    stat_ticker: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PostgresRepository {
    pub async fn connect(dsn: &str, logger: slog::Logger) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new().connect(dsn).await?;
        Ok(Self {
            pool,
            logger: logger.new(o!("component" => "postgres-repository")),
            stat_ticker: tokio::sync::Mutex::new(None),
        })
    }

    pub fn from_pool(pool: PgPool, logger: slog::Logger) -> Self {
        Self {
            pool,
            logger: logger.new(o!("component" => "postgres-repository")),
            stat_ticker: tokio::sync::Mutex::new(None),
        }
    }

    fn spawn_pool_stat_logger(&self) -> tokio::task::JoinHandle<()> {
        let pool = self.pool.clone();
        let logger = self.logger.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POOL_STAT_INTERVAL);
            loop {
                ticker.tick().await;
                debug!(
                    logger,
                    "pool stat";
                    "size" => pool.size(),
                    "idle" => pool.num_idle(),
                );
            }
        })
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn store_gauge(&self, id: &str, value: f64) -> Result<(), StorageError> {
        sqlx::query(UPSERT_METRIC)
            .bind(id)
            .bind(MetricKind::Gauge.as_str())
            .bind(Option::<i64>::None)
            .bind(Some(value))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_counter(&self, id: &str, delta: i64) -> Result<(), StorageError> {
        // Read-modify-write, not atomic (spec §4.4): acceptable under single-writer agent
        // usage; set_batch's running aggregate is the path that avoids the race.
        let existing = self.get_counter(id).await?.unwrap_or(0);
        let total = existing + delta;

        sqlx::query(UPSERT_METRIC)
            .bind(id)
            .bind(MetricKind::Counter.as_str())
            .bind(Some(total))
            .bind(Option::<f64>::None)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_gauge(&self, id: &str) -> Result<Option<f64>, StorageError> {
        let row = sqlx::query("SELECT value FROM metrics WHERE id = $1 AND type = 'gauge'")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<f64, _>("value")))
    }

    async fn get_counter(&self, id: &str) -> Result<Option<i64>, StorageError> {
        let row = sqlx::query("SELECT delta FROM metrics WHERE id = $1 AND type = 'counter'")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<i64, _>("delta")))
    }

    async fn get_all(&self) -> Result<MetricsSnapshot, StorageError> {
        let rows = sqlx::query("SELECT id, type, delta, value FROM metrics")
            .fetch_all(&self.pool)
            .await?;

        let mut snapshot = MetricsSnapshot::default();
        for row in rows {
            let id: String = row.get("id");
            let kind: String = row.get("type");
            match kind.as_str() {
                "gauge" => snapshot.gauges.push((id, row.get::<f64, _>("value"))),
                "counter" => snapshot.counters.push((id, row.get::<i64, _>("delta"))),
                _ => continue,
            }
        }
        Ok(snapshot)
    }

    /// Collapses per-id counter increments into a running aggregate before queuing the
    /// upserts, then commits everything in a single transaction (spec §4.4). A single
    /// failed upsert aborts the remaining batch.
    async fn set_batch(&self, metrics: &[Metric]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        let mut running_counters: HashMap<String, i64> = HashMap::new();

        for metric in metrics {
            metric.validate()?;
            match metric.kind {
                MetricKind::Counter => {
                    let delta = metric.delta.expect("validated");
                    let stored: Option<i64> = sqlx::query_scalar(
                        "SELECT delta FROM metrics WHERE id = $1 AND type = 'counter'",
                    )
                    .bind(&metric.id)
                    .fetch_optional(&mut *tx)
                    .await?;

                    let running = running_counters.entry(metric.id.clone()).or_insert(0);
                    let total = stored.unwrap_or(0) + *running + delta;
                    *running += delta;

                    sqlx::query(UPSERT_METRIC)
                        .bind(&metric.id)
                        .bind(MetricKind::Counter.as_str())
                        .bind(Some(total))
                        .bind(Option::<f64>::None)
                        .execute(&mut *tx)
                        .await?;
                }
                MetricKind::Gauge => {
                    let value = metric.value.expect("validated");
                    sqlx::query(UPSERT_METRIC)
                        .bind(&metric.id)
                        .bind(MetricKind::Gauge.as_str())
                        .bind(Option::<i64>::None)
                        .bind(Some(value))
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn on_start(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!(self.logger, "migrations applied");

        let handle = self.spawn_pool_stat_logger();
        *self.stat_ticker.lock().await = Some(handle);
        Ok(())
    }

    async fn on_close(&self) -> Result<(), StorageError> {
        if let Some(handle) = self.stat_ticker.lock().await.take() {
            handle.abort();
        }
        self.pool.close().await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_statement_matches_the_documented_conflict_clause() {
        assert!(UPSERT_METRIC.contains("ON CONFLICT (id, type) DO UPDATE"));
        assert!(UPSERT_METRIC.contains("SET type = $2, delta = $3, value = $4"));
    }

    #[test]
    fn batch_counter_aggregation_is_left_to_right() {
        let mut running: HashMap<String, i64> = HashMap::new();
        let stored = 10i64;

        let deltas = [1i64, 1, 3];
        let mut totals = Vec::new();
        for delta in deltas {
            let running_entry = running.entry("PollCount".to_string()).or_insert(0);
            let total = stored + *running_entry + delta;
            *running_entry += delta;
            totals.push(total);
        }

        assert_eq!(totals, vec![11, 12, 15]);
    }
}
