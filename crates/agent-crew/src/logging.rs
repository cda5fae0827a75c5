//! Tracing setup: stderr for every command, plus a daily log file for the
//! long-running server.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_PREFIX: &str = "crew.log";

/// Daily-rolling writer under `log_dir` (`crew.log.YYYY-MM-DD`).
///
/// The guard flushes pending lines on drop and must outlive the subscriber.
pub fn create_server_log_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log dir: {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(file_appender))
}

/// Initialize the global subscriber (once). `file` adds a plain-text layer
/// next to the stderr one.
pub fn init(file: Option<NonBlocking>) {
    let stderr = fmt::layer().with_writer(std::io::stderr);
    let file = file.map(|writer| fmt::layer().with_ansi(false).with_writer(writer));
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(stderr)
        .with(file)
        .try_init()
        .ok();
}
