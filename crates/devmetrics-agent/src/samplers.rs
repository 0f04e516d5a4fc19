use sysinfo::System;
use tikv_jemalloc_ctl::{epoch, stats};

use crate::registry::{MetricSource, Registry};

/// Cached jemalloc MIBs for the six runtime gauges this catalog tracks (spec §4.1a).
/// Resolving a MIB by name is the expensive half of a jemalloc control read, so it's done
/// once at agent startup and reused every sampling tick.
pub struct JemallocStats {
    epoch: epoch::mib_t,
    allocated: stats::allocated_mib,
    active: stats::active_mib,
    resident: stats::resident_mib,
    mapped: stats::mapped_mib,
    metadata: stats::metadata_mib,
    retained: stats::retained_mib,
}

impl JemallocStats {
    pub fn new() -> Result<Self, tikv_jemalloc_ctl::Error> {
        Ok(Self {
            epoch: epoch::mib()?,
            allocated: stats::allocated::mib()?,
            active: stats::active::mib()?,
            resident: stats::resident::mib()?,
            mapped: stats::mapped::mib()?,
            metadata: stats::metadata::mib()?,
            retained: stats::retained::mib()?,
        })
    }
}

/// Refreshes the jemalloc-backed runtime gauges (spec §4.1a). Individual stat read
/// failures are logged and skipped; the cycle never aborts (spec §4.1 failure semantics).
pub fn sample_runtime(registry: &Registry, jemalloc: &JemallocStats, logger: &slog::Logger) {
    if let Err(err) = jemalloc.epoch.advance() {
        slog::warn!(logger, "jemalloc epoch advance failed"; "error" => %err);
        return;
    }

    let reads: [(&str, Result<usize, tikv_jemalloc_ctl::Error>); 6] = [
        ("Allocated", jemalloc.allocated.read()),
        ("Active", jemalloc.active.read()),
        ("Resident", jemalloc.resident.read()),
        ("Mapped", jemalloc.mapped.read()),
        ("Metadata", jemalloc.metadata.read()),
        ("Retained", jemalloc.retained.read()),
    ];

    for (id, result) in reads {
        match result {
            Ok(value) => registry.set_gauge(id, value as f64, MetricSource::Runtime),
            Err(err) => {
                slog::warn!(logger, "jemalloc stat read failed"; "stat" => id, "error" => %err)
            }
        }
    }
}

/// Refreshes OS memory and per-core CPU utilization gauges (spec §4.1a). `sys` is owned by
/// the caller so repeated ticks reuse sysinfo's internal diff state instead of re-scanning
/// `/proc` from a cold `System::new_all()` every cycle.
pub fn sample_os_and_cpu(registry: &Registry, sys: &mut System) {
    sys.refresh_all();

    registry.set_gauge("TotalMemory", sys.total_memory() as f64, MetricSource::Os);
    registry.set_gauge("FreeMemory", sys.free_memory() as f64, MetricSource::Os);

    for (index, cpu) in sys.cpus().iter().enumerate() {
        registry.set_gauge(
            format!("CPUutilization{}", index + 1),
            cpu.cpu_usage() as f64,
            MetricSource::Cpu(index),
        );
    }
}

/// Refreshes the synthetic filler gauge.
pub fn sample_synthetic(registry: &Registry) {
    registry.set_gauge("RandomValue", rand::random::<f64>(), MetricSource::Synthetic);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_sample_lands_in_zero_one_range() {
        let registry = Registry::new();
        sample_synthetic(&registry);
        let value = registry.gauge("RandomValue").unwrap();
        assert!((0.0..1.0).contains(&value));
    }

    #[test]
    fn os_and_cpu_sample_populates_memory_gauges() {
        let registry = Registry::new();
        let mut sys = System::new_all();
        sample_os_and_cpu(&registry, &mut sys);
        assert!(registry.gauge("TotalMemory").is_some());
        assert!(registry.gauge("FreeMemory").is_some());
    }
}
