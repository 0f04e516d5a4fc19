use std::collections::HashMap;

use parking_lot::RwLock;

use devmetrics_dto::Metric;

/// Where a gauge's value comes from. Dispatch on the variant replaces the source's
/// original integer-tag filtering (§9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSource {
    Runtime,
    Os,
    Cpu(usize),
    Synthetic,
}

/// The agent's in-memory catalog of current values, guarded by a single readers-writer
/// lock (spec §4.1): sampler tasks take the writer side, the exporter takes the reader
/// side. CPU-per-core gauges are created lazily on first observation.
pub struct Registry {
    gauges: RwLock<HashMap<String, (f64, MetricSource)>>,
    poll_count: RwLock<i64>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            gauges: RwLock::new(HashMap::new()),
            poll_count: RwLock::new(0),
        }
    }

    pub fn set_gauge(&self, id: impl Into<String>, value: f64, source: MetricSource) {
        self.gauges.write().insert(id.into(), (value, source));
    }

    /// Per spec §9's Open-Question resolution: one increment per sampling tick, not per
    /// sampler invocation.
    pub fn tick_poll_count(&self) {
        *self.poll_count.write() += 1;
    }

    /// A read-consistent snapshot of every current gauge and the poll counter.
    pub fn snapshot(&self) -> Vec<Metric> {
        let gauges = self.gauges.read();
        let poll_count = *self.poll_count.read();

        let mut metrics: Vec<Metric> = gauges
            .iter()
            .map(|(id, (value, _))| Metric::gauge(id.clone(), *value))
            .collect();
        metrics.push(Metric::counter("PollCount", poll_count));
        metrics
    }

    #[cfg(test)]
    pub fn gauge(&self, id: &str) -> Option<f64> {
        self.gauges.read().get(id).map(|(v, _)| *v)
    }

    #[cfg(test)]
    pub fn poll_count(&self) -> i64 {
        *self.poll_count.read()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_gauge_is_last_writer_wins() {
        let registry = Registry::new();
        registry.set_gauge("RandomValue", 3.0402, MetricSource::Synthetic);
        registry.set_gauge("RandomValue", 9.1, MetricSource::Synthetic);
        assert_eq!(registry.gauge("RandomValue"), Some(9.1));
    }

    #[test]
    fn poll_count_increments_once_per_tick() {
        let registry = Registry::new();
        registry.tick_poll_count();
        registry.tick_poll_count();
        registry.tick_poll_count();
        assert_eq!(registry.poll_count(), 3);
    }

    #[test]
    fn snapshot_includes_every_gauge_and_the_poll_counter() {
        let registry = Registry::new();
        registry.set_gauge("Allocated", 1024.0, MetricSource::Runtime);
        registry.set_gauge("CPUutilization1", 12.5, MetricSource::Cpu(0));
        registry.tick_poll_count();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot
            .iter()
            .any(|m| m.id == "PollCount" && m.delta == Some(1)));
    }
}
