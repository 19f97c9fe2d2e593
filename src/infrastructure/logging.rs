//! Centralized file-based logging system
//!
//! Writes logs under the configured directory, separated by log type:
//! - main/ - All events as JSON
//! - error/ - WARN and ERROR only
//! - irc/ - Session and wire traffic
//! - directory/ - Discovery and directory API calls

use crate::infrastructure::config::LoggingConfig;
use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_TYPES: [&str; 4] = ["main", "error", "irc", "directory"];

/// Initialize console and file logging
///
/// Returns the appender guards, which must be kept alive for the duration
/// of the program so buffered lines are flushed on exit.
pub fn init_logging(config: &LoggingConfig) -> io::Result<Vec<WorkerGuard>> {
    create_log_dirs(&config.dir)?;

    let mut guards = Vec::with_capacity(LOG_TYPES.len());

    let (main_appender, guard) = create_appender(&config.dir, "main");
    guards.push(guard);
    let (error_appender, guard) = create_appender(&config.dir, "error");
    guards.push(guard);
    let (irc_appender, guard) = create_appender(&config.dir, "irc");
    guards.push(guard);
    let (directory_appender, guard) = create_appender(&config.dir, "directory");
    guards.push(guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let irc_layer = tracing_subscriber::fmt::layer()
        .with_writer(irc_appender)
        .with_ansi(false)
        .with_target(false)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target() == "irc"
        }));

    let directory_layer = tracing_subscriber::fmt::layer()
        .with_writer(directory_appender)
        .with_ansi(false)
        .with_target(false)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target() == "directory"
        }));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(irc_layer)
        .with(directory_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    crate::log_main!(
        tracing::Level::INFO,
        dir = %config.dir.display(),
        "Logging system initialized"
    );

    Ok(guards)
}

fn create_log_dirs(root: &Path) -> io::Result<()> {
    for log_type in LOG_TYPES {
        fs::create_dir_all(root.join(log_type))?;
    }
    Ok(())
}

/// Create a daily rolling, non-blocking file appender
fn create_appender(root: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, root.join(name), name);
    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_irc {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "irc", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_pool {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "pool", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_directory {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "directory", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_creation() {
        let root = tempfile::tempdir().unwrap();

        create_log_dirs(root.path()).unwrap();

        for log_type in LOG_TYPES {
            assert!(root.path().join(log_type).is_dir());
        }
        // Existing directories are fine
        create_log_dirs(root.path()).unwrap();
    }
}
