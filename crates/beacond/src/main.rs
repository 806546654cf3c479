//! beacond — the Beacon daemon.
//!
//! Single binary that assembles the heartbeat monitor:
//! - Durable registry (redb)
//! - In-memory liveness store
//! - Recovery worker
//! - Failure detector loop
//! - Heartbeat ingest listener
//! - REST API
//!
//! # Usage
//!
//! ```text
//! beacond standalone --api-port 8080 --ingest-port 9090 --data-dir /var/lib/beacon
//! beacond agent --monitor-addr 127.0.0.1:9090 --service-id 3 --interval 3
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use beacon_monitor::{AgentConfig, HeartbeatAgent, MonitorConfig};

#[derive(Parser)]
#[command(name = "beacond", about = "Beacon heartbeat monitor daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor (detector, recovery, ingest, and API in one process).
    Standalone {
        /// Port for the REST API.
        #[arg(long, default_value = "8080")]
        api_port: u16,

        /// Port for the heartbeat ingest listener.
        #[arg(long, default_value = "9090")]
        ingest_port: u16,

        /// Data directory for the durable registry.
        #[arg(long, default_value = "/var/lib/beacon")]
        data_dir: PathBuf,

        /// Detector tick period in seconds.
        #[arg(long, default_value = "5")]
        check_interval: u64,

        /// Silence threshold in seconds before a service is declared down.
        #[arg(long, default_value = "10")]
        failure_timeout: u64,

        /// Per-store-call deadline in milliseconds.
        #[arg(long, default_value = "2000")]
        op_deadline_ms: u64,
    },

    /// Run a heartbeat agent for one registered service.
    Agent {
        /// Address of the monitor's ingest listener (host:port).
        #[arg(long)]
        monitor_addr: String,

        /// Registered service id to beat for.
        #[arg(long)]
        service_id: u64,

        /// Beat interval in seconds.
        #[arg(long, default_value = "3")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,beacond=debug,beacon=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            api_port,
            ingest_port,
            data_dir,
            check_interval,
            failure_timeout,
            op_deadline_ms,
        } => {
            let config = MonitorConfig::new(
                Duration::from_secs(check_interval),
                Duration::from_secs(failure_timeout),
                Duration::from_millis(op_deadline_ms),
            );
            run_standalone(api_port, ingest_port, data_dir, config).await
        }
        Command::Agent {
            monitor_addr,
            service_id,
            interval,
        } => {
            run_agent(AgentConfig {
                monitor_addr,
                service_id,
                interval: Duration::from_secs(interval),
            })
            .await
        }
    }
}

async fn run_standalone(
    api_port: u16,
    ingest_port: u16,
    data_dir: PathBuf,
    config: MonitorConfig,
) -> anyhow::Result<()> {
    info!("Beacon daemon starting in standalone mode");

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("beacon.redb");

    // ── Initialize stores ──────────────────────────────────────

    let registry = beacon_registry::RegistryStore::open(&db_path)?;
    info!(path = ?db_path, "registry opened");

    let liveness: Arc<dyn beacon_liveness::LivenessStore> =
        Arc::new(beacon_liveness::MemoryLivenessStore::new());
    info!("liveness store initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Recovery worker ────────────────────────────────────────

    let (recovery_tx, recovery_rx) = beacon_monitor::recovery_channel();
    let worker = beacon_monitor::RecoveryWorker::new(
        Arc::new(registry.clone()),
        liveness.clone(),
        recovery_rx,
        config.op_deadline,
    );
    let recovery_handle = tokio::spawn(worker.run());
    info!("recovery worker started");

    // ── Failure detector ───────────────────────────────────────

    let detector = beacon_monitor::FailureDetector::new(
        liveness.clone(),
        Arc::new(registry.clone()),
        config.clone(),
    );
    let detector_handle = tokio::spawn(detector.run(shutdown_rx.clone()));
    info!(
        check_interval = ?config.check_interval,
        failure_timeout = ?config.failure_timeout,
        "failure detector started"
    );

    // ── Heartbeat ingest listener ──────────────────────────────

    let ingestor = Arc::new(beacon_monitor::HeartbeatIngestor::new(
        liveness.clone(),
        recovery_tx,
    ));
    let ingest_router = beacon_monitor::build_ingest_router(ingestor);
    let ingest_addr = SocketAddr::from(([0, 0, 0, 0], ingest_port));
    let ingest_listener = tokio::net::TcpListener::bind(ingest_addr).await?;
    info!(%ingest_addr, "heartbeat ingest listening");

    let mut ingest_shutdown = shutdown_rx.clone();
    let ingest_handle = tokio::spawn(async move {
        axum::serve(ingest_listener, ingest_router)
            .with_graceful_shutdown(async move {
                let _ = ingest_shutdown.changed().await;
            })
            .await
    });

    // ── API server ─────────────────────────────────────────────

    let api_router = beacon_api::build_router(registry, liveness);
    let api_addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
    info!(%api_addr, "API server listening");

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(api_listener, api_router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks. The recovery worker exits once the
    // ingest router (the last sender) is dropped and the channel drains.
    let _ = detector_handle.await;
    let _ = ingest_handle.await;
    let _ = recovery_handle.await;

    info!("Beacon daemon stopped");
    Ok(())
}

async fn run_agent(config: AgentConfig) -> anyhow::Result<()> {
    let agent = HeartbeatAgent::new(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    agent.run(shutdown_rx).await;
    Ok(())
}
