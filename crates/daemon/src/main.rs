//! Atelier Job Engine - Main Entry Point
//! Composition root: settings, logging, the three service queues, JSON-RPC, health.

mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use atelier_api_rpc::RpcServer;
use atelier_core::application::constants::SHUTDOWN_TIMEOUT;
use atelier_core::application::{shutdown_channel, HealthReporter, JobQueue, JobServices};
use atelier_core::domain::{OperationKind, QueueConfig};
use atelier_core::port::{JobExecutor, SystemProbe};
use atelier_infra_system::{SimulatedExecutor, SystemProbeImpl};
use settings::{CliArgs, DaemonSettings, LogFormat};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_LOG_FILTER: &str = "atelier=info";

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init(),
    }
    .context("Failed to install tracing subscriber")
}

fn build_services(
    settings: &DaemonSettings,
    executor: Arc<dyn JobExecutor>,
    system_probe: Arc<dyn SystemProbe>,
) -> Result<JobServices> {
    let spawn = |kind: OperationKind| -> Result<JobQueue> {
        let config: QueueConfig = settings.queues.get(kind).clone();
        info!(
            operation = %kind,
            max_concurrent = config.max_concurrent_jobs,
            depth_limit = config.queue_depth_limit,
            max_retries = config.max_retries,
            "Starting queue"
        );
        JobQueue::builder(config, executor.clone())
            .system_probe(system_probe.clone())
            .spawn()
            .with_context(|| format!("Failed to start {} queue", kind))
    };

    let services = JobServices::new(
        spawn(OperationKind::Render)?,
        spawn(OperationKind::Export)?,
        spawn(OperationKind::Sync)?,
    )?;
    Ok(services)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (defaults → files → env → flags)
    let cli = CliArgs::parse();
    let settings = settings::load(&cli).context("Failed to load configuration")?;

    // 2. Initialize logging
    init_logging(settings.log_format)?;
    info!("Atelier Job Engine v{} starting...", VERSION);

    // 3. Setup dependencies (DI wiring)
    let executor: Arc<dyn JobExecutor> = Arc::new(SimulatedExecutor::new(settings.simulation));
    let system_probe: Arc<dyn SystemProbe> = Arc::new(SystemProbeImpl::new());
    let services = build_services(&settings, executor, system_probe)?;

    // 4. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let (rpc_addr, rpc_handle) = RpcServer::new(settings.rpc.clone(), services.clone())
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 5. Start health reporter
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let reporter = HealthReporter::new(
        services.clone(),
        Duration::from_secs(settings.health_interval_secs),
    );
    let health_handle = tokio::spawn(reporter.run(shutdown_rx));

    info!(rpc = %rpc_addr, "System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: stop intake, then drain background tasks
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    services.shutdown_all().await;
    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, health_handle).await;

    info!("Shutdown complete.");

    Ok(())
}
