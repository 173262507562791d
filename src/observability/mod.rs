//! Observability: structured logging and metrics.
//!
//! Logging is a single `tracing` fmt layer behind an [`EnvFilter`]
//! (`tracing_subscriber::EnvFilter`). Where events go and how they look
//! both come from `[logging]` in the datasync config: stderr unless a log
//! file is set, pretty unless `format = "json"`.

mod logging;
pub mod metrics;

pub use logging::{LOG_FILTER_ENV, LogFormat, LoggingConfig};

use crate::{Error, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global tracing subscriber and registers metric descriptions.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if a global subscriber is already set
/// or the log file cannot be opened.
pub fn init(config: LoggingConfig) -> Result<()> {
    let to_file = config.file.is_some();
    let writer = match &config.file {
        Some(path) => BoxMakeWriter::new(Mutex::new(open_log_file(path)?)),
        None => BoxMakeWriter::new(io::stderr),
    };

    let layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_ansi(!to_file)
            .with_target(to_file)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(config.filter)
        .try_init()
        .map_err(|e| init_failed(e.to_string()))?;

    metrics::describe();
    tracing::debug!(format = config.format.as_str(), to_file, "Logging initialized");
    Ok(())
}

/// Opens the configured log file for appending, creating its directory.
fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| init_failed(format!("{}: {e}", parent.display())))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| init_failed(format!("{}: {e}", path.display())))
}

fn init_failed(cause: String) -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause,
    }
}
