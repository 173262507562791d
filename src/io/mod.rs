//! Import/Export I/O subsystem.
//!
//! Moves tabular records between entities and CSV/XLSX files one bounded
//! window at a time.
//!
//! # Architecture
//!
//! The I/O subsystem uses a trait-based architecture:
//!
//! - **Format codecs** implement [`FormatCodec`] for windowed encode/decode
//! - **Entity hooks** implement [`RowSource`] (export) and [`RowSink`] (import)
//! - **Validation** checks request shape before any side effect
//! - **Pipelines** run a single window against a codec and the chunk store
//!
//! # Supported Formats
//!
//! | Format | Import | Export | Notes |
//! |--------|--------|--------|-------|
//! | CSV | ✓ | ✓ | Header row required, quoted fields honored |
//! | XLSX | ✓ | ✓ | First worksheet only, full parse per window |
//!
//! # Examples
//!
//! ## Decode one window
//!
//! ```rust,ignore
//! use datasync::io::{CsvCodec, FormatCodec};
//!
//! let file = std::fs::File::open("users.csv")?;
//! let window = CsvCodec::new().decode(Box::new(file), None, 100, 50)?;
//! println!("{} rows, eof = {}", window.rows_consumed, window.end_of_file);
//! ```

pub mod formats;
pub mod services;
pub mod traits;
pub mod validation;

// Re-exports for convenience
pub use formats::{CsvCodec, Format, XlsxCodec, codec_for};
pub use services::{ExportPipeline, ExportWindowOutcome, ImportPipeline, ImportWindowOutcome};
pub use traits::{ApplyOutcome, ByteStream, DecodedWindow, FormatCodec, RowSink, RowSource};
pub use validation::{
    ExportPlan, ExportRequest, ImportPlan, ImportRequest, ValidationIssue, ValidationSeverity,
    validate_export_request, validate_import_request,
};
