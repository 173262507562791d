//! Export pipeline.
//!
//! Every window appends an encoded CSV data section to a staging artifact
//! `<job_id>.part`; the first window also writes the header. When the source
//! runs dry the staging artifact is finalized into `<job_id>.<ext>`: CSV is
//! renamed in place, XLSX is re-encoded as a single worksheet because the
//! container cannot be appended to.
//!
//! The staging artifact is never served; only the finalized key is.
//!
//! The job records how long the staging artifact was after its last committed
//! window. A retried window first cuts the staging artifact back to that
//! length, so bytes from a failed attempt (including a final window whose
//! finalization failed) are never written twice.

use crate::io::formats::{CsvCodec, Format, XlsxCodec};
use crate::io::traits::{FormatCodec, RowSource};
use crate::models::{Job, JobId};
use crate::observability::metrics::{
    ROWS_EXPORTED, WINDOW_DURATION, duration_to_millis, u64_to_f64, usize_to_u64,
};
use crate::storage::{ChunkArtifact, ChunkStore};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Result of one export window.
#[derive(Debug, Clone)]
pub struct ExportWindowOutcome {
    /// The staging artifact, or the final artifact after the last window.
    pub artifact: ChunkArtifact,
    /// Rows fetched and written in this window.
    pub rows_written: usize,
    /// Whether the source may have more rows.
    pub has_more: bool,
    /// Length of the staging artifact once this window was written.
    pub staged_bytes: u64,
}

/// Pulls rows from a [`RowSource`] and assembles a downloadable artifact.
pub struct ExportPipeline {
    store: Arc<dyn ChunkStore>,
}

impl ExportPipeline {
    /// Creates a pipeline writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self { store }
    }

    /// Key of the staging artifact for a job.
    #[must_use]
    pub fn staging_key(job_id: &JobId) -> String {
        format!("{job_id}.part")
    }

    /// Key of the finished artifact for a job.
    #[must_use]
    pub fn artifact_key(job_id: &JobId, format: Format) -> String {
        format!("{job_id}.{}", format.extension())
    }

    /// Runs one window starting at the job's cursor.
    ///
    /// `has_more` is `true` iff the source yielded exactly `limit` rows. On
    /// the final window the artifact is finalized before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or the store write
    /// fails. The job is not modified, so the window can be retried.
    #[instrument(
        name = "datasync.export.window",
        skip(self, job, source),
        fields(job_id = %job.job_id, cursor = job.cursor, format = %job.format)
    )]
    pub fn run_window(
        &self,
        job: &Job,
        source: &dyn RowSource,
        limit: usize,
    ) -> Result<ExportWindowOutcome> {
        if limit == 0 {
            return Err(Error::InvalidWindow("limit must be > 0".to_string()));
        }
        let start = Instant::now();

        let rows = source.fetch(job.cursor, limit)?;
        let rows_written = rows.len();
        let has_more = rows_written == limit;

        let first_window = job.cursor == 0;
        let bytes = CsvCodec::new().encode(&rows, &job.columns, first_window)?;
        let staging = Self::staging_key(&job.job_id);
        let mut artifact = if first_window {
            // Replaces leftovers from a failed first attempt.
            self.store.put(&staging, Some(&job.job_id), &bytes)?
        } else {
            self.rewind_staging(job, &staging)?;
            self.store.append(&staging, Some(&job.job_id), &bytes)?
        };
        let staged_bytes = artifact.size_bytes;

        if !has_more {
            artifact = self.finalize(job)?;
        }

        metrics::counter!(ROWS_EXPORTED, "format" => job.format.extension())
            .increment(usize_to_u64(rows_written));
        metrics::histogram!(WINDOW_DURATION, "kind" => "export")
            .record(u64_to_f64(duration_to_millis(start.elapsed())));

        debug!(rows_written, has_more, "Export window written");
        Ok(ExportWindowOutcome {
            artifact,
            rows_written,
            has_more,
            staged_bytes,
        })
    }

    /// Cuts the staging artifact back to the job's last committed length.
    fn rewind_staging(&self, job: &Job, staging: &str) -> Result<()> {
        let current = self
            .store
            .stat(staging)?
            .ok_or_else(|| Error::FileNotFound(staging.to_string()))?;
        if current.size_bytes != job.staged_bytes {
            warn!(
                staging,
                size_bytes = current.size_bytes,
                staged_bytes = job.staged_bytes,
                "Discarding bytes from an uncommitted export window"
            );
            self.store.truncate(staging, job.staged_bytes)?;
        }
        Ok(())
    }

    /// Converts the staging artifact into the final artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging artifact is missing or cannot be
    /// converted.
    pub fn finalize(&self, job: &Job) -> Result<ChunkArtifact> {
        let staging = Self::staging_key(&job.job_id);
        let target = Self::artifact_key(&job.job_id, job.format);

        let artifact = match job.format {
            Format::Csv => self.store.rename(&staging, &target)?,
            Format::Xlsx => {
                let staged = CsvCodec::new().decode(
                    self.store.get(&staging)?,
                    None,
                    0,
                    usize::MAX,
                )?;
                let bytes = XlsxCodec::new().encode(&staged.rows, &job.columns, true)?;
                let artifact = self.store.put(&target, Some(&job.job_id), &bytes)?;
                self.store.delete(&staging)?;
                artifact
            },
        };

        info!(
            job_id = %job.job_id,
            key = %artifact.key,
            size_bytes = artifact.size_bytes,
            "Export artifact finalized"
        );
        Ok(artifact)
    }
}
