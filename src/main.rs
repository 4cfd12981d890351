use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nerovaagent::cli::{self, Cli};
use nerovaagent::config::Config;

/// Stdout plus a rotating daily file under `log_dir/process.log`, separate
/// from the per-run journal artifacts `nerova-journal` writes. Returns the
/// guard the caller must keep alive for the process lifetime.
fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir).context("failed to create log directory")?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "process.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    let _logging_guard = init_logging(&config.log_dir).context("failed to initialize logging")?;

    let cli = Cli::parse();
    cli::dispatch(cli, config).await
}
