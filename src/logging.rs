//! Logging setup
//!
//! Built once by the host process; the library only emits `tracing` events.

use crate::config::LoggingConfig;
use crate::error::{CommsiftError, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name of the log written under `<data_dir>/logs`
pub const LOG_FILE_NAME: &str = "commsift.log";

/// Directory holding the log file
pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Filter directive used when `RUST_LOG` is unset
pub fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.level.to_lowercase()
    };
    format!("commsift={}", level)
}

/// Install the global subscriber: stderr always, plus a file when enabled
///
/// Returns the guard of the non-blocking file writer; it must be held until
/// the process exits so buffered lines get flushed.
pub fn init_logging(
    config: &LoggingConfig,
    data_dir: &Path,
    verbose: bool,
) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, verbose)));

    let (file_layer, guard) = if config.file_logging {
        let dir = log_dir(data_dir);
        std::fs::create_dir_all(&dir).map_err(|e| CommsiftError::Io {
            source: e,
            context: format!("Failed to create log directory: {:?}", dir),
        })?;

        let appender = tracing_appender::rolling::never(&dir, LOG_FILE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| CommsiftError::Config(format!("Failed to install logger: {}", e)))?;

    Ok(guard)
}
