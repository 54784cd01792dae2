use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use studyhub_gate::admission::{AdmissionController, AdmissionTable, Sweeper};
use studyhub_gate::config::{LogFormat, LoggingConfig, ServiceConfig};
use studyhub_gate::http::{AppState, HttpServer};

/// Command line arguments. Values given here override the file and environment.
#[derive(Parser, Debug)]
#[command(name = "studyhub-gate", version)]
#[command(about = "Request admission gateway for the StudyHub API")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Maximum requests per client per window
    #[arg(long)]
    limit: Option<u32>,

    /// Rolling window length in seconds
    #[arg(long)]
    window_secs: Option<u64>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_tracing(&config.logging);

    info!("Starting StudyHub admission gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    match &args.config {
        Some(path) => info!(path = %path.display(), "Loaded configuration file"),
        None => info!("No configuration file given, using defaults and environment"),
    }
    info!(
        http_addr = %config.server.http_addr,
        limit = config.admission.limit,
        window_secs = config.admission.window_secs,
        trust_forwarded_for = config.admission.trust_forwarded_for,
        "Configuration loaded"
    );

    // The admission table lives for the whole process and is shared by
    // every request handler and the sweeper.
    let table = match config.admission.shards {
        Some(shards) => AdmissionTable::with_shards(shards),
        None => AdmissionTable::new(),
    };
    let controller = Arc::new(AdmissionController::new(
        Arc::new(table),
        config.admission.policy(),
    ));
    let state = AppState::from_config(controller.clone(), &config.admission);

    let sweeper = config
        .admission
        .sweep_interval()
        .map(|interval| Sweeper::spawn(controller.clone(), state.clock.clone(), interval));

    let server = HttpServer::new(config.server.http_addr, state);
    let result = server.serve_with_shutdown(shutdown_signal()).await;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    result?;

    info!("StudyHub admission gateway stopped");
    Ok(())
}

/// Merge file, environment, `PORT` and command line settings.
fn load_config(args: &Args) -> anyhow::Result<ServiceConfig> {
    let mut config = ServiceConfig::load(args.config.as_deref())?;

    if let Ok(port) = std::env::var("PORT") {
        let port: u16 = port
            .parse()
            .with_context(|| format!("Invalid PORT value {:?}", port))?;
        config.server.http_addr.set_port(port);
    }

    if let Some(addr) = args.addr {
        config.server.http_addr = addr;
    }
    if let Some(limit) = args.limit {
        config.admission.limit = limit;
    }
    if let Some(window_secs) = args.window_secs {
        config.admission.window_secs = window_secs;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }

    config.validate()?;
    Ok(config)
}

/// Initialize tracing. `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
