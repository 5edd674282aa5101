//! Tracing setup.
//!
//! The TUI owns the terminal, so logs always go to a daily-rolling file
//! (`$FFMM_LOG_DIR/ffmm.log.YYYY-MM-DD`, default `logs/`). Verbosity comes from
//! `FFMM_LOG`, falling back to `RUST_LOG`, then `info`.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

pub const LOG_ENV: &str = "FFMM_LOG";
pub const LOG_DIR_ENV: &str = "FFMM_LOG_DIR";
const DEFAULT_LOG_DIR: &str = "logs";

/// Install the global subscriber. Keep the guard alive until exit so buffered
/// lines are flushed.
pub fn init() -> Result<Option<WorkerGuard>, AppError> {
    let dir = std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR));
    std::fs::create_dir_all(&dir)
        .map_err(|e| AppError::io(format!("Failed to create log dir '{}': {e}", dir.display())))?;

    let appender = tracing_appender::rolling::daily(&dir, "ffmm.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed (tests, embedding); keep it.
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    Ok(installed.is_ok().then_some(guard))
}
