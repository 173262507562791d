//! Import pipeline.
//!
//! Decodes one `offset`/`limit` window of a staged upload, validates each
//! row against the entity, and applies it. A bad row never aborts the
//! window: it is recorded as a [`RowError`] and the next row is processed.
//! Window-level failures (decode errors, missing files, header mismatches)
//! abort before any row is applied.

use crate::io::formats::{Format, codec_for};
use crate::io::traits::{ApplyOutcome, RowSink};
use crate::io::validation::rejection_reason;
use crate::models::{ChunkWindow, RowError};
use crate::observability::metrics::{
    ROW_ERRORS, ROWS_IMPORTED, WINDOW_DURATION, duration_to_millis, u64_to_f64, usize_to_u64,
};
use crate::storage::ChunkStore;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Result of one import window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportWindowOutcome {
    /// Rows attempted in this window, successful or not.
    pub rows_processed: usize,
    /// Rows rejected by validation or apply, in file order.
    pub row_errors: Vec<RowError>,
    /// Non-fatal validation warnings for rows that were still applied.
    pub warnings: Vec<RowError>,
    /// Rows that created a new record.
    pub inserted: usize,
    /// Rows that replaced an existing record.
    pub updated: usize,
    /// Whether no data rows follow this window.
    pub end_of_file: bool,
}

impl ImportWindowOutcome {
    /// Rows applied successfully.
    #[must_use]
    pub const fn applied(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Applies windows of a staged upload to a [`RowSink`].
pub struct ImportPipeline {
    store: Arc<dyn ChunkStore>,
}

impl ImportPipeline {
    /// Creates a pipeline reading staged uploads from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self { store }
    }

    /// Runs one window.
    ///
    /// Row indices in the reported errors are 1-based data row numbers,
    /// counted after the header.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::FileNotFound`] if the upload is not staged
    /// - [`crate::Error::CorruptFile`], [`crate::Error::DecodeFailure`] or
    ///   [`crate::Error::ColumnMismatch`] from the codec; no rows are applied
    /// - any error from [`RowSink::flush`]
    #[instrument(
        name = "datasync.import.window",
        skip(self, sink, window),
        fields(file_name = %window.file_name, offset = window.offset, limit = window.limit)
    )]
    pub fn run_window(
        &self,
        sink: &dyn RowSink,
        format: Format,
        window: &ChunkWindow,
    ) -> Result<ImportWindowOutcome> {
        let start = Instant::now();
        let stream = self.store.get(&window.file_name)?;

        let expected = sink.columns();
        let expected = (!expected.is_empty()).then_some(expected.as_slice());
        let decoded = codec_for(format).decode(stream, expected, window.offset, window.limit)?;

        let mut outcome = ImportWindowOutcome {
            rows_processed: decoded.rows_consumed,
            end_of_file: decoded.end_of_file || decoded.rows_consumed < window.limit,
            ..Default::default()
        };

        for (i, row) in decoded.rows.iter().enumerate() {
            let row_index = window.offset + i + 1;

            let issues = sink.validate(row);
            if let Some(reason) = rejection_reason(&issues) {
                outcome.row_errors.push(RowError::new(row_index, reason));
                continue;
            }
            outcome.warnings.extend(
                issues
                    .iter()
                    .map(|issue| RowError::new(row_index, issue.to_string())),
            );

            match sink.apply(row) {
                Ok(ApplyOutcome::Inserted) => outcome.inserted += 1,
                Ok(ApplyOutcome::Updated) => outcome.updated += 1,
                Err(reason) => outcome.row_errors.push(RowError::new(row_index, reason)),
            }
        }

        sink.flush()?;

        if !outcome.row_errors.is_empty() {
            warn!(
                rejected = outcome.row_errors.len(),
                "Import window finished with row errors"
            );
        }

        metrics::counter!(ROWS_IMPORTED, "format" => format.extension())
            .increment(usize_to_u64(outcome.applied()));
        metrics::counter!(ROW_ERRORS)
            .increment(usize_to_u64(outcome.row_errors.len()));
        metrics::histogram!(WINDOW_DURATION, "kind" => "import")
            .record(u64_to_f64(duration_to_millis(start.elapsed())));

        debug!(
            rows_processed = outcome.rows_processed,
            inserted = outcome.inserted,
            updated = outcome.updated,
            end_of_file = outcome.end_of_file,
            "Import window applied"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::io::validation::ValidationIssue;
    use crate::models::Row;
    use crate::storage::FilesystemChunkStore;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MapSink {
        rows: Mutex<HashMap<String, Row>>,
    }

    impl RowSink for MapSink {
        fn columns(&self) -> Vec<String> {
            vec!["id".to_string(), "email".to_string()]
        }

        fn validate(&self, row: &Row) -> Vec<ValidationIssue> {
            let mut issues = Vec::new();
            if !row.get("email").unwrap_or("").contains('@') {
                issues.push(ValidationIssue::error("email", "must contain '@'"));
            }
            if row.get("email").is_some_and(|e| e.ends_with(".test")) {
                issues.push(ValidationIssue::warning("email", "test domain"));
            }
            issues
        }

        fn apply(&self, row: &Row) -> std::result::Result<ApplyOutcome, String> {
            let id = row.get("id").unwrap_or("").to_string();
            if id == "boom" {
                return Err("storage rejected id".to_string());
            }
            let mut rows = self.rows.lock().unwrap();
            Ok(match rows.insert(id, row.clone()) {
                Some(_) => ApplyOutcome::Updated,
                None => ApplyOutcome::Inserted,
            })
        }
    }

    fn setup(data: &str) -> (TempDir, ImportPipeline) {
        let dir = TempDir::new().unwrap();
        let store = FilesystemChunkStore::new(dir.path()).unwrap();
        let mut reader = data.as_bytes();
        store.stage_upload("users.csv", &mut reader).unwrap();
        (dir, ImportPipeline::new(Arc::new(store)))
    }

    fn users(n: usize) -> String {
        let mut data = String::from("id,email\n");
        for i in 1..=n {
            data.push_str(&format!("{i},u{i}@example.com\n"));
        }
        data
    }

    #[test]
    fn test_short_file_single_window() {
        let (_dir, pipeline) = setup(&users(7));
        let sink = MapSink::default();

        let outcome = pipeline
            .run_window(&sink, Format::Csv, &ChunkWindow::new("users.csv", 0, 10))
            .unwrap();
        assert_eq!(outcome.rows_processed, 7);
        assert!(outcome.end_of_file);
        assert!(outcome.row_errors.is_empty());
        assert_eq!(outcome.inserted, 7);
    }

    #[test]
    fn test_bad_row_does_not_abort_window() {
        let data = "id,email\n1,a@x.com\n2,b@x.com\n3,c@x.com\n4,broken\n5,e@x.com\n";
        let (_dir, pipeline) = setup(data);
        let sink = MapSink::default();

        let outcome = pipeline
            .run_window(&sink, Format::Csv, &ChunkWindow::new("users.csv", 0, 10))
            .unwrap();
        assert_eq!(outcome.rows_processed, 5);
        assert_eq!(outcome.row_errors.len(), 1);
        assert_eq!(outcome.row_errors[0].row_index, 4);
        assert!(sink.rows.lock().unwrap().contains_key("5"));
    }

    #[test]
    fn test_apply_failure_is_row_error() {
        let (_dir, pipeline) = setup("id,email\nboom,a@x.com\n2,b@x.com\n");
        let sink = MapSink::default();

        let outcome = pipeline
            .run_window(&sink, Format::Csv, &ChunkWindow::new("users.csv", 0, 10))
            .unwrap();
        assert_eq!(outcome.row_errors, vec![RowError::new(1, "storage rejected id")]);
        assert_eq!(outcome.inserted, 1);
    }

    #[test]
    fn test_warnings_still_apply() {
        let (_dir, pipeline) = setup("id,email\n1,a@example.test\n");
        let sink = MapSink::default();

        let outcome = pipeline
            .run_window(&sink, Format::Csv, &ChunkWindow::new("users.csv", 0, 10))
            .unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.inserted, 1);
    }

    #[test]
    fn test_row_index_is_offset_based() {
        let data = "id,email\n1,a@x.com\n2,b@x.com\n3,bad\n";
        let (_dir, pipeline) = setup(data);
        let sink = MapSink::default();

        let outcome = pipeline
            .run_window(&sink, Format::Csv, &ChunkWindow::new("users.csv", 2, 2))
            .unwrap();
        assert_eq!(outcome.rows_processed, 1);
        assert_eq!(outcome.row_errors[0].row_index, 3);
        assert!(outcome.end_of_file);
    }

    #[test]
    fn test_replayed_window_is_idempotent() {
        let (_dir, pipeline) = setup(&users(4));
        let sink = MapSink::default();
        let window = ChunkWindow::new("users.csv", 0, 4);

        let first = pipeline.run_window(&sink, Format::Csv, &window).unwrap();
        let second = pipeline.run_window(&sink, Format::Csv, &window).unwrap();

        assert_eq!(first.rows_processed, second.rows_processed);
        assert_eq!(first.row_errors, second.row_errors);
        assert_eq!(second.updated, 4);
        assert_eq!(sink.rows.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_missing_file() {
        let (_dir, pipeline) = setup(&users(1));
        let err = pipeline
            .run_window(
                &MapSink::default(),
                Format::Csv,
                &ChunkWindow::new("other.csv", 0, 10),
            )
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_header_mismatch_applies_nothing() {
        let (_dir, pipeline) = setup("id,name\n1,a\n");
        let sink = MapSink::default();
        let err = pipeline
            .run_window(&sink, Format::Csv, &ChunkWindow::new("users.csv", 0, 10))
            .unwrap_err();
        assert!(matches!(err, Error::ColumnMismatch { .. }));
        assert!(sink.rows.lock().unwrap().is_empty());
    }
}
