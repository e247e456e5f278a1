//! Radius - dynamic proxy configuration service.
//!
//! Runs the configuration selector behind the local control API and keeps
//! settings and per-site overrides in the app data directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use directories::ProjectDirs;
use radius_core::selector::{SelectorConfig, DEFAULT_ERROR_THRESHOLD, DEFAULT_FAILURE_PATH};
use radius_server::{Server, ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use radius_storage::{Database, KvStore, Settings};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Radius - picks a working proxy configuration for every site
#[derive(Parser, Debug)]
#[command(name = "radius", version, about)]
struct Args {
    /// Host for the control API
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port for the control API
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Database file (default: app data directory)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Default wisp server URL
    #[arg(long)]
    wisp_server: Option<String>,

    /// Bare server URL
    #[arg(long)]
    bare_server: Option<String>,

    /// Quiet period before buffered errors are evaluated, in milliseconds
    #[arg(long, default_value_t = 500)]
    debounce_ms: u64,

    /// Critical errors within one quiet period that trigger a switch
    #[arg(long, default_value_t = DEFAULT_ERROR_THRESHOLD)]
    error_threshold: usize,

    /// Page shown once every configuration has failed for a site
    #[arg(long, default_value = DEFAULT_FAILURE_PATH)]
    failure_path: String,

    /// Turn dynamic configuration selection on and remember it
    #[arg(long)]
    enable_dynamic_loading: bool,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let selector = SelectorConfig::default()
            .with_debounce(Duration::from_millis(self.debounce_ms))
            .with_error_threshold(self.error_threshold)
            .with_failure_path(self.failure_path.clone());

        let mut config = ServerConfig::default()
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_selector(selector);
        if let Some(ref url) = self.wisp_server {
            config = config.with_wisp_server(url.clone());
        }
        if let Some(ref url) = self.bare_server {
            config = config.with_bare_server(url.clone());
        }
        config
    }
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "radius", "radius").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("radius={},warn", log_level)));

    if let Some(log_dir) = logs_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("radius")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

/// Opens the database from `--db-path` or the app data directory.
fn open_database(args: &Args) -> anyhow::Result<Database> {
    let db = match args.db_path {
        Some(ref path) => Database::with_path(path),
        None => Database::new(),
    }
    .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive for the duration of the program
    let _log_guard = init_logging(&args);

    tracing::info!("Starting Radius...");
    tracing::debug!("Args: {:?}", args);

    let db = open_database(&args)?;

    if args.enable_dynamic_loading {
        Settings::new(KvStore::settings(Arc::new(db.clone()))).set_dynamic_loading(true);
        tracing::info!("Dynamic configuration selection turned on");
    }

    let server = Server::with_database(args.server_config(), db).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupt received"),
    }

    tracing::info!("Radius shutting down");
    Ok(())
}
