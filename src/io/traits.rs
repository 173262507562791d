//! Core traits for import/export operations.
//!
//! Defines the [`FormatCodec`] trait that format adapters implement, and the
//! [`RowSource`] / [`RowSink`] capability traits that entity plugins
//! implement so the pipelines never depend on a concrete entity.

use super::formats::Format;
use super::validation::ValidationIssue;
use crate::Result;
use crate::models::Row;
use std::io::{Read, Seek};

/// A readable, seekable byte source.
///
/// Blanket-implemented for every `Read + Seek` type, so files and
/// in-memory cursors both qualify.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// An owned byte stream handed to a codec for decoding.
pub type ByteStream = Box<dyn ReadSeek + Send>;

/// Rows decoded from one `offset`/`limit` window.
#[derive(Debug, Clone, Default)]
pub struct DecodedWindow {
    /// Decoded rows, in file order.
    pub rows: Vec<Row>,
    /// Number of data rows consumed from the window.
    pub rows_consumed: usize,
    /// Whether the file has no data rows past this window.
    pub end_of_file: bool,
    /// Header columns found in the file.
    pub header: Vec<String>,
}

/// Encodes rows to and decodes rows from a tabular byte stream.
///
/// # Windowed Decoding
///
/// `offset` and `limit` address data rows after the header. Implementations
/// skip exactly one header row regardless of the window.
///
/// # Example Implementation
///
/// ```rust,ignore
/// impl FormatCodec for TsvCodec {
///     fn format(&self) -> Format { Format::Csv }
///
///     fn encode(&self, rows: &[Row], columns: &[String], header: bool) -> Result<Vec<u8>> {
///         // Write header once, then one line per row
///     }
///
///     fn decode(&self, stream: ByteStream, expected: Option<&[String]>,
///               offset: usize, limit: usize) -> Result<DecodedWindow> {
///         // Skip header + offset rows, read up to limit rows
///     }
/// }
/// ```
pub trait FormatCodec: Send + Sync {
    /// The format this codec handles.
    fn format(&self) -> Format;

    /// Encodes rows projected onto `columns`.
    ///
    /// When `include_header` is `true` the column names are written first.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn encode(&self, rows: &[Row], columns: &[String], include_header: bool) -> Result<Vec<u8>>;

    /// Decodes data rows `[offset, offset + limit)`.
    ///
    /// When `expected` is given, every expected column must be present in
    /// the header.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CorruptFile`] if the stream cannot be parsed at
    /// all, [`crate::Error::ColumnMismatch`] if expected columns are missing,
    /// and [`crate::Error::DecodeFailure`] if a record in the window is
    /// malformed.
    fn decode(
        &self,
        stream: ByteStream,
        expected: Option<&[String]>,
        offset: usize,
        limit: usize,
    ) -> Result<DecodedWindow>;
}

/// Export-side entity hook: a source of rows.
///
/// Sources are read with a monotonically advancing cursor; a cursor is never
/// rewound within a job.
pub trait RowSource: Send + Sync {
    /// Ordered column names the entity exposes.
    fn columns(&self) -> Vec<String>;

    /// Total number of rows the source would yield.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing data cannot be counted.
    fn count(&self) -> Result<usize>;

    /// Fetches up to `limit` rows starting at `cursor`.
    ///
    /// Returning fewer than `limit` rows signals exhaustion.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing data cannot be read.
    fn fetch(&self, cursor: usize, limit: usize) -> Result<Vec<Row>>;
}

/// What applying a row did to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyOutcome {
    /// A new record was created.
    Inserted,
    /// An existing record was replaced.
    Updated,
}

/// Import-side entity hook: a sink for rows.
///
/// `apply` must be upsert-safe: applying the same row twice yields the same
/// stored state, so replayed windows are idempotent.
pub trait RowSink: Send + Sync {
    /// Columns that must be present in an imported file's header.
    fn columns(&self) -> Vec<String>;

    /// Validates a row against the entity schema.
    ///
    /// Issues with [`super::validation::ValidationSeverity::Error`] reject the
    /// row; warnings are reported but the row is still applied.
    fn validate(&self, row: &Row) -> Vec<ValidationIssue>;

    /// Inserts or updates a row.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if the row cannot be stored.
    fn apply(&self, row: &Row) -> std::result::Result<ApplyOutcome, String>;

    /// Flushes buffered writes after a window.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting buffered writes fails.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
