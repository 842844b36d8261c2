//! Log file setup.
//!
//! stdout is the render surface, so logs never go to the terminal. They are
//! written to `${APTOP_HOME}/logs/aptop.log`, filtered by `APTOP_LOG`
//! (EnvFilter syntax, default `info`).

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::paths;

const LOG_ENV: &str = "APTOP_LOG";
const LOG_FILE: &str = "aptop.log";

/// Installs the global subscriber writing to the default logs directory.
///
/// Returns the writer guard, which must be kept alive for the duration of
/// the program so buffered lines are flushed on exit.
///
/// # Errors
/// Returns an error if the logs directory cannot be resolved or created, or
/// a global subscriber is already set.
pub fn init() -> Result<WorkerGuard> {
    let dir = paths::logs_dir().context("cannot determine logs directory")?;
    init_in(&dir)
}

/// Installs the global subscriber writing to `dir/aptop.log`.
///
/// # Errors
/// Returns an error if `dir` cannot be created or a global subscriber is
/// already set.
pub fn init_in(dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create logs directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
        .context("install tracing subscriber")?;

    Ok(guard)
}

/// Routes panics through `tracing` before the default hook prints them.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "panic");
        default_hook(info);
    }));
}
