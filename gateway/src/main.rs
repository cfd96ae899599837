//! Gateway HTTP server binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use common::{BackendRegistry, SystemClock};
use tracing_subscriber::EnvFilter;

use gateway::server::{AppState, CliArgs, GatewayServer, GatewayServerConfig, HttpMetrics};
use gateway::{Gateway, GatewayConfig, IngestPipeline, Metrics, load_config};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    let server_config = GatewayServerConfig::from(&args);

    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to load config from {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => GatewayConfig::default(),
    };

    tracing::info!("Opening {} backend", config.backend.kind);
    let backend = match BackendRegistry::with_defaults().create(&config.backend).await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("Failed to create storage backend: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = backend.raw_command("ping").await {
        tracing::error!("Storage backend did not answer ping: {}", e);
        return ExitCode::FAILURE;
    }

    // HTTP metrics share the registry so /metrics exposes everything
    let mut metrics = Metrics::new();
    let http_metrics = Arc::new(HttpMetrics::register(metrics.registry_mut()));
    let metrics = Arc::new(metrics);

    let mut pipeline = IngestPipeline::new(&config.pipeline, backend.clone(), metrics.clone());
    pipeline.start();

    let gateway = Gateway::new(
        pipeline.handle(),
        backend.clone(),
        &config.query,
        Arc::new(SystemClock),
        metrics.clone(),
    );
    let state = AppState {
        gateway: Arc::new(gateway),
        metrics,
    };

    let server = GatewayServer::new(state, http_metrics, server_config);
    let mut exit = ExitCode::SUCCESS;
    if let Err(e) = server.run().await {
        tracing::error!("HTTP server failed: {}", e);
        exit = ExitCode::FAILURE;
    }

    match pipeline.stop().await {
        Ok(letters) if !letters.is_empty() => {
            let rows: usize = letters.iter().map(|l| l.batch.len()).sum();
            tracing::error!(
                "{} batches ({} measurements) were never stored",
                letters.len(),
                rows
            );
            exit = ExitCode::FAILURE;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("Ingest pipeline did not stop cleanly: {}", e);
            exit = ExitCode::FAILURE;
        }
    }
    if let Err(e) = backend.close().await {
        tracing::error!("Failed to close storage backend: {}", e);
        exit = ExitCode::FAILURE;
    }
    exit
}
