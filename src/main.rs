//! serverkit demo server.
//!
//! Serves `/ping` plus the metrics snapshot endpoint, and shuts down
//! gracefully on SIGINT/SIGTERM.
//!
//! ```text
//! load config → init logging → [prometheus] → bind → Lifecycle::run
//!     start → wait for signal or serve loop exit → drain → cleanups (LIFO)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use axum::{routing::get, Router};
use clap::Parser;

use serverkit::config::{load_config, ServerConfig};
use serverkit::observability::{init_logging, metrics::init_prometheus, RequestMetrics};
use serverkit::{HttpServer, Lifecycle};

#[derive(Parser)]
#[command(name = "serverkit")]
#[command(about = "Minimal HTTP server with graceful lifecycle management", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "serverkit exited with error");
            eprintln!("serverkit: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability)?;
    tracing::info!("serverkit v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        shutdown_timeout_secs = config.lifecycle.shutdown_timeout_secs,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if let Some(addr) = &config.observability.prometheus_address {
        init_prometheus(addr.parse()?)?;
    }

    let metrics = Arc::new(RequestMetrics::new());
    let app = Router::new().route("/ping", get(|| async { "pong" }));

    let handle = HttpServer::bind_handle(&config, app, Arc::clone(&metrics))
        .await?
        .with_on_start(|ctx| {
            tracing::info!(address = %ctx.addr, "Accepting connections");
        });

    let mut lifecycle = Lifecycle::from_config(handle, &config.lifecycle);
    lifecycle.on_cleanup("metrics-report", move || {
        let snapshot = serde_json::to_string(&metrics.snapshot())?;
        tracing::info!(metrics = %snapshot, "Final request metrics");
        Ok::<_, serde_json::Error>(())
    });

    lifecycle.run().await?;
    Ok(())
}
