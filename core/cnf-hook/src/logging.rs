//! File logging for the hook binary.
//!
//! Stdout belongs to the shell, so logs go to a daily rolling file under
//! `~/.winget-cnf/logs`. `RUST_LOG` controls the filter; the default is
//! `warn`.

use fs_err as fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "winget-cnf-hook.log";

fn log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".winget-cnf").join("logs"))
}

/// Installs the global subscriber. The returned guard must be held until
/// exit so buffered lines are flushed.
pub fn init() -> Option<WorkerGuard> {
    let dir = log_dir()?;
    if fs::create_dir_all(&dir).is_err() {
        return None;
    }

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(guard)
}
