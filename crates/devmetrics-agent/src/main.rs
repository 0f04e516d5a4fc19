mod export;
mod lifecycle;
mod logging;
mod registry;
mod samplers;
mod settings;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use devmetrics_crypto::{HmacSigner, Sha256Hasher};
use slog::{info, o, warn};
use sysinfo::System;

use lifecycle::Lifecycle;
use registry::Registry;
use samplers::JemallocStats;
use settings::{AgentSettings, Cli, TransportKind};
use transport::grpc::GrpcDispatcher;
use transport::http::HttpDispatcher;
use transport::Dispatcher;

#[global_allocator]
static JEMALLOC_MEMORY_ALLOCATOR: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = AgentSettings::load(cli)?;
    let logger = logging::build_logger(settings.log_format);

    let registry = Arc::new(Registry::new());
    let signer = Arc::new(HmacSigner::new(Sha256Hasher::new(), settings.hash_key.clone()));

    let dispatcher: Arc<dyn Dispatcher> = match settings.transport {
        TransportKind::Http => {
            let crypto_key = if settings.crypto_key_configured() {
                Some(devmetrics_crypto::read_public_key(&settings.crypto_key_path)?)
            } else {
                None
            };
            Arc::new(HttpDispatcher::new(
                &settings.server_address,
                crypto_key,
                logger.new(o!("component" => "transport-http")),
            ))
        }
        TransportKind::Grpc => Arc::new(
            GrpcDispatcher::connect(
                &settings.grpc_address,
                logger.new(o!("component" => "transport-grpc")),
            )
            .await?,
        ),
    };

    let runtime_sample_task = {
        let registry = registry.clone();
        let logger = logger.new(o!("component" => "sampler-runtime"));
        let poll_interval = settings.poll_interval();
        tokio::spawn(async move { run_runtime_sampler(registry, poll_interval, logger).await })
    };

    let os_cpu_sample_task = {
        let registry = registry.clone();
        let poll_interval = settings.poll_interval();
        tokio::spawn(async move { run_os_cpu_sampler(registry, poll_interval).await })
    };

    let dispatch_task = {
        let registry = registry.clone();
        let logger = logger.new(o!("component" => "dispatcher"));
        let report_interval = settings.report_interval();
        let signer = signer.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            run_dispatcher(registry, dispatcher, signer, report_interval, logger).await
        })
    };

    info!(logger, "devmetrics-agent started";
        "server" => &settings.server_address, "transport" => ?settings.transport);

    tokio::select! {
        _ = runtime_sample_task => {}
        _ = os_cpu_sample_task => {}
        _ = dispatch_task => {}
        _ = tokio::signal::ctrl_c() => {
            info!(logger, "shutdown signal received");
        }
    }

    // Draining: one final best-effort flush, no deadline (spec §4.5).
    let metrics = export::sign_snapshot(registry.snapshot(), signer.as_ref());
    if let Err(err) = dispatcher.dispatch(&metrics).await {
        warn!(logger, "final flush failed"; "error" => %err);
    }

    info!(logger, "devmetrics-agent stopped");
    Ok(())
}

/// Drives the `runtime+counters` sampler (spec §4.1): jemalloc-backed runtime gauges plus
/// the synthetic filler gauge, on its own ticker. Runs independently of the `os+cpu`
/// sampler below; both mutate the registry under its own lock (spec §4.1 concurrency note).
async fn run_runtime_sampler(registry: Arc<Registry>, poll_interval: Duration, logger: slog::Logger) {
    let jemalloc = match JemallocStats::new() {
        Ok(stats) => stats,
        Err(err) => {
            warn!(logger, "jemalloc stats unavailable, runtime gauges disabled"; "error" => %err);
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                samplers::sample_synthetic(&registry);
                registry.tick_poll_count();
            }
        }
    };

    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        ticker.tick().await;
        samplers::sample_runtime(&registry, &jemalloc, &logger);
        samplers::sample_synthetic(&registry);
        registry.tick_poll_count();
    }
}

/// Drives the `os+cpu` sampler (spec §4.1) on its own ticker, independent of the
/// runtime sampler above.
async fn run_os_cpu_sampler(registry: Arc<Registry>, poll_interval: Duration) {
    let mut sys = System::new_all();
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        ticker.tick().await;
        samplers::sample_os_and_cpu(&registry, &mut sys);
        registry.tick_poll_count();
    }
}

async fn run_dispatcher(
    registry: Arc<Registry>,
    dispatcher: Arc<dyn Dispatcher>,
    signer: Arc<HmacSigner<Sha256Hasher>>,
    report_interval: Duration,
    logger: slog::Logger,
) {
    let mut lifecycle = Lifecycle::new(logger.clone());
    let mut ticker = tokio::time::interval(report_interval);
    loop {
        ticker.tick().await;
        let metrics = export::sign_snapshot(registry.snapshot(), signer.as_ref());
        match dispatcher.dispatch(&metrics).await {
            Ok(()) => lifecycle.mark_running(),
            Err(err) => warn!(logger, "dispatch failed"; "error" => %err),
        }
    }
}
