//! Prometheus probe exporter for Gitea.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use gitea_exporter_prometheus::config::{LogFormat, validate_probe_path};
use gitea_exporter_prometheus::{AppState, HttpServer, Prober, TargetRegistry};

/// Prometheus probe exporter for Gitea.
#[derive(Parser, Debug)]
#[command(name = "gitea-exporter-prometheus")]
#[command(about = "Expose Gitea organization, repository and pull request metrics on demand")]
#[command(version)]
struct Args {
    /// Path to the target file (YAML, or JSON5 for .json5/.json).
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:9115")]
    listen: SocketAddr,

    /// Path of the probe endpoint.
    #[arg(long, default_value = "/probe")]
    probe_path: String,

    /// Timeout for each Gitea API request in seconds (0 disables it).
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("gitea_exporter_prometheus={}", log_level).parse()?)
        .add_directive(format!("gitea_client={}", log_level).parse()?);

    match args.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!(
        address = %args.listen,
        path = %args.probe_path,
        config = %args.config.display(),
        "Starting Gitea Exporter"
    );

    validate_probe_path(&args.probe_path)?;

    let targets = TargetRegistry::load_from_file(&args.config).map_err(|e| {
        anyhow::anyhow!("Failed to load targets from {}: {}", args.config.display(), e)
    })?;
    info!(targets = targets.len(), "Loaded targets");

    let timeout = (args.request_timeout_secs > 0)
        .then(|| Duration::from_secs(args.request_timeout_secs));
    let http = gitea_client::build_http_client(timeout)?;

    let state = AppState::new(targets, Prober::new(http));
    let http_server = HttpServer::new(state, args.listen, args.probe_path.clone());

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    // Wait for shutdown signal or an early server exit
    tokio::select! {
        result = &mut http_task => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
            };
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    match tokio::time::timeout(Duration::from_secs(5), http_task).await {
        Ok(Ok(Err(e))) => error!("HTTP server error: {}", e),
        Ok(Err(e)) => error!("HTTP server task failed: {}", e),
        Err(_) => error!("HTTP server did not stop within 5s"),
        Ok(Ok(Ok(()))) => {}
    }

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
