//! # Datasync
//!
//! Chunked import/export engine for tabular records.
//!
//! Datasync exports records to a downloadable CSV or XLSX file and imports
//! records from an uploaded file, one bounded window at a time, so that large
//! datasets never block a single request.
//!
//! ## Features
//!
//! - CSV and XLSX codecs with `offset`/`limit` windowed decoding
//! - Filesystem chunk store with per-key append serialization
//! - Export and import pipelines driven window by window
//! - Job orchestrator tracking `{processed, total, done}` per job
//! - Daily reclamation sweep for stale chunk artifacts
//! - Pluggable entities through the [`RowSource`] and [`RowSink`] traits
//!
//! ## Example
//!
//! ```rust,ignore
//! use datasync::{EntityRegistry, JobOrchestrator, RecordTable};
//! use datasync::io::validation::ExportRequest;
//!
//! let table = Arc::new(RecordTable::new("id", ["id", "name"]));
//! let registry = EntityRegistry::new().with_entity("users", table);
//! let orchestrator = JobOrchestrator::new(store, Arc::new(registry), OrchestratorConfig::default());
//!
//! let job_id = orchestrator.start_export("users", &ExportRequest::new("csv"))?;
//! while !orchestrator.step_export(&job_id)?.done {}
//! let artifact = orchestrator.download(&job_id)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod entities;
pub mod gc;
pub mod io;
pub mod jobs;
pub mod models;
pub mod observability;
pub mod storage;

// Re-exports for convenience
pub use config::DataSyncConfig;
pub use entities::{EntityRegistry, RecordTable};
pub use io::formats::Format;
pub use io::traits::{RowSink, RowSource};
pub use jobs::{JobOrchestrator, OrchestratorConfig};
pub use models::{ChunkWindow, Job, JobId, JobKind, JobState, Row, RowError};
pub use storage::{ChunkArtifact, ChunkStore, FilesystemChunkStore};

/// Error type for datasync operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Validation` | Request shape is wrong (missing fields, empty column names) |
/// | `InvalidWindow` | `offset`/`limit` missing, negative, zero, or out of sequence |
/// | `UnsupportedFormat` | Format is neither `csv` nor `xlsx` |
/// | `CorruptFile` | The byte stream cannot be parsed at all |
/// | `DecodeFailure` | A record inside the window cannot be decoded |
/// | `ColumnMismatch` | Declared columns are missing from the file header |
/// | `FileNotFound` | An import file name does not resolve to a staged upload |
/// | `Store` | Chunk store I/O fails |
/// | `JobNotFound` | A job id is unknown to the orchestrator |
/// | `UnknownEntity` | No entity plugin is registered under the given name |
/// | `InvalidState` | A job cannot accept the requested operation in its state |
/// | `OperationFailed` | Config loading, logging setup, or codec writer failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The request shape is invalid.
    ///
    /// Surfaced before any job is created or advanced.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The `offset`/`limit` window is invalid.
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// The requested format is not supported.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The byte stream could not be parsed at all.
    #[error("corrupt file: {0}")]
    CorruptFile(String),

    /// A record inside the current window could not be decoded.
    ///
    /// Row boundaries past the break cannot be trusted, so no partial rows
    /// are reported for the window.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// The file header does not carry the declared columns.
    #[error("column mismatch: missing [{}] (file has [{}])", missing.join(", "), found.join(", "))]
    ColumnMismatch {
        /// Declared columns absent from the header.
        missing: Vec<String>,
        /// Columns found in the header.
        found: Vec<String>,
    },

    /// The file name does not resolve to a staged upload.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// A chunk store operation failed.
    #[error("store operation '{operation}' failed: {cause}")]
    Store {
        /// The store operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The job id is unknown.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// No entity is registered under the given name.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The job cannot accept the operation in its current state.
    #[error("job {job_id} is {state}")]
    InvalidState {
        /// The job id.
        job_id: String,
        /// Human-readable state description.
        state: String,
    },

    /// A non-store operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns `true` for errors that abort the current window without
    /// touching row-level state.
    #[must_use]
    pub const fn is_window_fatal(&self) -> bool {
        matches!(
            self,
            Self::CorruptFile(_) | Self::DecodeFailure(_) | Self::ColumnMismatch { .. }
        )
    }

    /// Returns `true` when resubmitting the same window may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store { .. } | Self::DecodeFailure(_) | Self::OperationFailed { .. }
        )
    }

    /// Builds a [`Error::Store`] from an operation name and cause.
    pub(crate) fn store(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Store {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for datasync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use datasync::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
