//! jetson-exporterd — Prometheus exporter for NVIDIA Jetson boards.
//!
//! Single binary that assembles:
//! - Metric registry
//! - tegrastats hardware source
//! - Board identity resolver + telemetry poller
//! - `/metrics` scrape endpoint
//!
//! # Usage
//!
//! ```text
//! jetson-exporterd --config /etc/jetson-exporter/exporter.toml --listen 0.0.0.0:8000
//! ```

use std::future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::Parser;
use jetson_collector::{
    BoardResolver, HardwareSession, Poller, StatvfsProbe, SystemFiles, TegrastatsSource,
};
use jetson_exporterd::{ExporterConfig, Overrides, ServerState, build_router};
use jetson_metrics::MetricRegistry;
use tokio::sync::watch;
use tracing::{error, info, warn};

const DEFAULT_FILTER: &str = "info,jetson_exporterd=debug,jetson_collector=debug";

#[derive(Parser)]
#[command(name = "jetson-exporterd", about = "Prometheus exporter for NVIDIA Jetson telemetry")]
struct Cli {
    /// TOML config file. Every setting has a default.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = ExporterConfig::load(cli.config.as_deref(), &cli.overrides)?;

    run(config).await
}

async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    info!(
        listen = %config.listen,
        root = %config.root.display(),
        style = ?config.board_info_style,
        "Jetson exporter starting"
    );

    let listener = tokio::net::TcpListener::bind(config.listen).await?;

    // ── Collector ──────────────────────────────────────────────

    let registry = Arc::new(MetricRegistry::new());
    let resolver = BoardResolver::new(SystemFiles::new(config.root.clone()), config.release_table())?;
    let poller = Poller::new(registry.clone(), resolver, StatvfsProbe, config.poller_config())?;

    let session = HardwareSession::new(TegrastatsSource::spawn(&config.tegrastats_config())?);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = ServerState::new(registry);
    let collecting = state.collecting.clone();

    // ── Poller task ────────────────────────────────────────────

    // The poller blocks on tegrastats output, so it gets a blocking thread.
    let poller_handle = tokio::task::spawn_blocking(move || {
        let summary = poller.run(session, shutdown_rx);
        collecting.store(false, Ordering::Relaxed);
        if summary.exhausted {
            warn!(
                cycles = summary.cycles,
                "hardware interface exhausted; serving last known values"
            );
        }
        summary
    });

    // ── Scrape endpoint ────────────────────────────────────────

    info!(addr = %config.listen, "scrape endpoint listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to install Ctrl-C handler");
                future::pending::<()>().await;
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // The session is released by the time the task returns.
    match poller_handle.await {
        Ok(summary) => info!(
            cycles = summary.cycles,
            published = summary.published,
            dropped = summary.dropped,
            "poller joined"
        ),
        Err(e) => error!(error = %e, "poller task failed"),
    }

    info!("Jetson exporter stopped");
    Ok(())
}
