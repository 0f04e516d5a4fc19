mod error;
mod grpc;
mod handlers;
mod logging;
mod middleware;
mod router;
mod settings;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use devmetrics_dto::proto::dev_metrics_server::DevMetricsServer;
use devmetrics_storage::{MemoryRepository, PostgresRepository, Repository};
use hyper_util::rt::TokioIo;
use slog::{info, o};
use tokio::net::TcpListener;

use handlers::AppState;
use router::Router;
use settings::{Cli, ServerSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Arc::new(ServerSettings::load(cli)?);
    let logger = logging::build_logger(settings.log_format);

    let repo: Arc<dyn Repository> = if settings.db_dsn.is_empty() {
        Arc::new(MemoryRepository::new(
            settings.store_file.clone(),
            Duration::from_secs(settings.store_interval_secs),
            settings.restore,
            logger.clone(),
        ))
    } else {
        Arc::new(PostgresRepository::connect(&settings.db_dsn, logger.clone()).await?)
    };
    repo.on_start().await?;

    let crypto_key = if settings.crypto_key_configured() {
        Some(devmetrics_crypto::read_private_key(&settings.crypto_key_path)?)
    } else {
        None
    };
    let trusted_network = settings.trusted_network();

    let state = Arc::new(AppState {
        repo: repo.clone(),
        settings: settings.clone(),
        logger: logger.new(o!("component" => "handlers")),
        crypto_key,
        trusted_network,
    });

    let http_addr: SocketAddr = settings.http_address.parse()?;
    let grpc_addr: SocketAddr = settings.grpc_address.parse()?;

    let http_task = {
        let logger = logger.clone();
        tokio::spawn(async move { run_http_server(http_addr, state, logger).await })
    };

    let grpc_task = {
        let logger = logger.clone();
        let service = grpc::GrpcService::new(repo.clone(), logger.new(o!("component" => "grpc")));
        tokio::spawn(async move { run_grpc_server(grpc_addr, service, logger).await })
    };

    info!(logger, "devmetrics-server started";
        "http" => %http_addr, "grpc" => %grpc_addr);

    tokio::select! {
        res = http_task => res??,
        res = grpc_task => res??,
        _ = tokio::signal::ctrl_c() => {
            info!(logger, "shutdown signal received");
        }
    }

    repo.on_close().await?;
    info!(logger, "devmetrics-server stopped");
    Ok(())
}

async fn run_http_server(
    addr: SocketAddr,
    state: Arc<AppState>,
    logger: slog::Logger,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(logger, "http listener bound"; "address" => %addr);

    let router = Router::new(state);
    loop {
        let (stream, peer) = listener.accept().await?;
        let router = router.clone();
        let logger = logger.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            if let Err(err) = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, router)
                .await
            {
                slog::warn!(logger, "connection error"; "peer" => %peer, "error" => %err);
            }
        });
    }
}

async fn run_grpc_server(
    addr: SocketAddr,
    service: grpc::GrpcService,
    logger: slog::Logger,
) -> anyhow::Result<()> {
    info!(logger, "grpc listener bound"; "address" => %addr);
    tonic::transport::Server::builder()
        .add_service(DevMetricsServer::new(service))
        .serve(addr)
        .await?;
    Ok(())
}
