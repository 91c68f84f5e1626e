//! Tabula Server Daemon
//!
//! The `tabulad` binary serves the tool protocol over stdio:
//! - Reads one JSON request per line from stdin
//! - Writes one JSON response per line to stdout
//! - Logs to stderr
//! - Exits on end of input or SIGTERM/SIGINT
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings
//! tabulad
//!
//! # Use a configuration file
//! tabulad --config /etc/tabula/tabulad.toml
//!
//! # One-off request
//! echo '{"op": "load_table", "table_name": "users"}' | tabulad
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tabula_server::config::ServerConfig;
use tabula_server::protocol;
use tabula_server::Workspace;

/// Tabula Server Daemon
#[derive(Parser, Debug)]
#[command(
    name = "tabulad",
    version,
    about = "Tabula handle server",
    long_about = "Tabula keeps tables in memory behind opaque handles.\n\n\
                  This daemon serves JSON-lines tool requests on stdin/stdout."
)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", env = "TABULA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "TABULA_LOG_LEVEL")]
    log_level: String,

    /// Maximum rows for top_n and full_string
    #[arg(long, env = "TABULA_MAX_ROWS")]
    max_rows: Option<usize>,

    /// Seed for sample_string
    #[arg(long, env = "TABULA_SAMPLE_SEED")]
    sample_seed: Option<u64>,

    /// Maximum statements per script
    #[arg(long, env = "TABULA_MAX_SCRIPT_STATEMENTS")]
    max_script_statements: Option<usize>,

    /// Maximum rows in a table produced by a script
    #[arg(long, env = "TABULA_MAX_SCRIPT_ROWS")]
    max_script_rows: Option<usize>,

    /// Log every request
    #[arg(long)]
    log_requests: bool,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,
}

/// How long shutdown waits for the stdin reader and an in-flight request.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let result = runtime.block_on(run_server(config));
    // Blocking stdin reads and running scripts cannot be cancelled.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter = EnvFilter::try_new(format!(
        "tabula_server={level},tabula_script={level},tabulad={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = if let Some(path) = &args.config {
        ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?
    } else {
        ServerConfig::default()
    };

    if let Some(rows) = args.max_rows {
        config.max_rows = rows;
    }
    if let Some(seed) = args.sample_seed {
        config.sample_seed = seed;
    }
    if let Some(max) = args.max_script_statements {
        config.max_script_statements = max;
    }
    if let Some(max) = args.max_script_rows {
        config.max_script_rows = max;
    }
    if args.log_requests {
        config.log_requests = true;
    }

    Ok(config)
}

async fn run_server(config: ServerConfig) -> Result<()> {
    info!("Tabula v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Max rows: {}", config.max_rows);
    info!("  Sample seed: {}", config.sample_seed);
    info!(
        "  Script limits: {} statements, {} rows",
        config.max_script_statements, config.max_script_rows
    );

    let ws = Arc::new(Workspace::new(config).context("Failed to create workspace")?);

    tokio::select! {
        result = serve_stdio(Arc::clone(&ws)) => {
            result?;
            info!("End of input");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    let stats = ws.stats();
    info!(
        "Served {} operations ({} failed), {} handles stored",
        stats.operations, stats.failed_operations, stats.handles
    );
    info!("Server stopped");
    Ok(())
}

async fn serve_stdio(ws: Arc<Workspace>) -> Result<()> {
    protocol::serve(ws, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("Failed to serve stdio")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
