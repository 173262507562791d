//! Job orchestrator.
//!
//! Owns every job and sequences windows into complete exports and imports.
//! Steps on different jobs run in parallel; steps on one job are serialized
//! by that job's mutex, so window N+1 never starts before window N is done.

// The job guard is held for the whole step on purpose.
#![allow(clippy::significant_drop_tightening)]

use crate::entities::EntityRegistry;
use crate::io::formats::Format;
use crate::io::services::{ExportPipeline, ImportPipeline};
use crate::io::validation::{
    ExportRequest, ImportRequest, validate_export_request, validate_import_request,
};
use crate::models::{ChunkWindow, Job, JobId, JobKind, JobState, RowError};
use crate::storage::{ChunkArtifact, ChunkStore};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, instrument, warn};

/// Default number of rows per export window.
pub const DEFAULT_EXPORT_CHUNK_SIZE: usize = 1000;

/// Default upper bound for an import window's `limit`.
pub const DEFAULT_MAX_WINDOW_LIMIT: usize = 10_000;

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Rows fetched per export window.
    pub export_chunk_size: usize,
    /// Largest `limit` accepted for an import window.
    pub max_window_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            export_chunk_size: DEFAULT_EXPORT_CHUNK_SIZE,
            max_window_limit: DEFAULT_MAX_WINDOW_LIMIT,
        }
    }
}

impl OrchestratorConfig {
    /// Sets the export window size.
    #[must_use]
    pub const fn with_export_chunk_size(mut self, size: usize) -> Self {
        self.export_chunk_size = size;
        self
    }

    /// Sets the import window limit.
    #[must_use]
    pub const fn with_max_window_limit(mut self, limit: usize) -> Self {
        self.max_window_limit = limit;
        self
    }
}

/// Progress after an export step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportProgress {
    /// Rows written so far.
    pub processed: usize,
    /// Row count, when known.
    pub total: Option<usize>,
    /// Whether the export finished.
    pub done: bool,
    /// Whether the artifact can be downloaded.
    pub download_ready: bool,
}

/// Progress after an import step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    /// Rows attempted so far, successful or not.
    pub processed: usize,
    /// Row count, when known.
    pub total: Option<usize>,
    /// Whether the end of the file was reached.
    pub done: bool,
    /// Rows rejected in this window.
    pub errors: Vec<RowError>,
    /// Warnings for rows applied in this window.
    pub warnings: Vec<RowError>,
}

/// Sequences windows for export and import jobs.
pub struct JobOrchestrator {
    store: Arc<dyn ChunkStore>,
    registry: Arc<EntityRegistry>,
    config: OrchestratorConfig,
    export: ExportPipeline,
    import: ImportPipeline,
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
}

impl JobOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChunkStore>,
        registry: Arc<EntityRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            export: ExportPipeline::new(Arc::clone(&store)),
            import: ImportPipeline::new(Arc::clone(&store)),
            store,
            registry,
            config,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the orchestrator configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Starts an export job.
    ///
    /// The request is validated before anything else; a rejected request
    /// never creates a job or touches the chunk store.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] / [`Error::UnsupportedFormat`] for bad requests
    /// - [`Error::UnknownEntity`] if `entity` has no registered source
    #[instrument(skip(self, request), fields(format = ?request.format))]
    pub fn start_export(&self, entity: &str, request: &ExportRequest) -> Result<JobId> {
        let plan = validate_export_request(request)?;
        let source = self.registry.source(entity)?;

        let available = source.columns();
        let columns = match plan.columns {
            Some(columns) => {
                let unknown: Vec<&str> = columns
                    .iter()
                    .filter(|c| !available.contains(c))
                    .map(String::as_str)
                    .collect();
                if !unknown.is_empty() {
                    return Err(Error::Validation(format!(
                        "unknown columns for '{entity}': {}",
                        unknown.join(", ")
                    )));
                }
                columns
            },
            None => available,
        };

        let mut job = Job::export(entity, plan.format, columns);
        job.set_total(source.count()?);
        let job_id = job.job_id.clone();
        info!(job_id = %job_id, entity, total = ?job.total, "Export job started");
        self.insert(job);
        Ok(job_id)
    }

    /// Runs the next export window.
    ///
    /// Stepping a completed job returns its final progress.
    ///
    /// # Errors
    ///
    /// - [`Error::JobNotFound`] for unknown ids
    /// - [`Error::InvalidState`] for failed or import jobs
    /// - source or store errors; the job keeps its last good state
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn step_export(&self, job_id: &JobId) -> Result<ExportProgress> {
        let handle = self.handle(job_id)?;
        let mut job = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Self::expect_kind(&job, JobKind::Export)?;

        match job.state {
            JobState::Completed => return Ok(Self::export_progress(&job)),
            JobState::Failed => return Err(Self::invalid_state(&job)),
            JobState::Pending | JobState::Running => {},
        }

        let source = self.registry.source(&job.entity)?;
        let outcome = self
            .export
            .run_window(&job, source.as_ref(), self.config.export_chunk_size)?;

        job.transition(JobState::Running)?;
        job.cursor += outcome.rows_written;
        job.staged_bytes = outcome.staged_bytes;
        job.record_processed(outcome.rows_written);

        if !outcome.has_more {
            job.total = Some(job.processed);
            job.artifact_key = Some(outcome.artifact.key);
            job.transition(JobState::Completed)?;
            info!(processed = job.processed, "Export job completed");
        } else {
            debug!(processed = job.processed, "Export window done");
        }

        Ok(Self::export_progress(&job))
    }

    /// Starts an import job for a staged upload.
    ///
    /// The format defaults to the one implied by the file extension.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty file name
    /// - [`Error::UnknownEntity`] if `entity` has no registered sink
    /// - [`Error::FileNotFound`] if the upload is not staged
    /// - [`Error::UnsupportedFormat`] if no format can be determined
    #[instrument(skip(self))]
    pub fn start_import(
        &self,
        entity: &str,
        file_name: &str,
        format: Option<Format>,
    ) -> Result<JobId> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(Error::Validation("file_name is required".to_string()));
        }
        let format = match format {
            Some(format) => format,
            None => Format::from_path(Path::new(file_name))?,
        };
        let sink = self.registry.sink(entity)?;
        if self.store.stat(file_name)?.is_none() {
            return Err(Error::FileNotFound(file_name.to_string()));
        }

        let job = Job::import(entity, format, sink.columns(), file_name);
        let job_id = job.job_id.clone();
        info!(job_id = %job_id, entity, file_name, %format, "Import job started");
        self.insert(job);
        Ok(job_id)
    }

    /// Runs one import window.
    ///
    /// The window must start at the job's next offset, or repeat the last
    /// accepted window exactly. A repeated window is re-applied (the sink is
    /// upsert-safe) but does not count towards `processed` again.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] / [`Error::InvalidWindow`] for bad requests
    /// - [`Error::InvalidWindow`] for out-of-sequence offsets
    /// - [`Error::InvalidState`] for failed or export jobs
    /// - window-level decode errors; the job is marked failed only if this
    ///   was its first window
    #[instrument(skip(self, request), fields(job_id = %job_id))]
    pub fn step_import(&self, job_id: &JobId, request: &ImportRequest) -> Result<ImportProgress> {
        let plan = validate_import_request(request, self.config.max_window_limit)?;
        let handle = self.handle(job_id)?;
        let mut job = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Self::expect_kind(&job, JobKind::Import)?;

        match job.state {
            JobState::Completed => return Ok(Self::import_progress(&job, Vec::new(), Vec::new())),
            JobState::Failed => return Err(Self::invalid_state(&job)),
            JobState::Pending | JobState::Running => {},
        }

        if job.file_name.as_deref() != Some(plan.window.file_name.as_str()) {
            return Err(Error::Validation(format!(
                "file_name '{}' does not belong to job {}",
                plan.window.file_name, job.job_id
            )));
        }

        let replay = job.last_window.as_ref() == Some(&plan.window);
        if !replay && plan.window.offset != job.next_offset() {
            return Err(Error::InvalidWindow(format!(
                "expected offset {}, got {}",
                job.next_offset(),
                plan.window.offset
            )));
        }

        let sink = self.registry.sink(&job.entity)?;
        let outcome = match self.import.run_window(sink.as_ref(), job.format, &plan.window) {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_window_fatal() && job.last_window.is_none() {
                    warn!(error = %e, "First import window failed, marking job failed");
                    job.transition(JobState::Failed)?;
                }
                return Err(e);
            },
        };

        job.transition(JobState::Running)?;
        if let Some(total) = plan.total {
            if job.total.is_none() {
                job.set_total(total);
            }
        }
        if replay {
            debug!(offset = plan.window.offset, "Replayed import window");
        } else {
            job.record_processed(outcome.rows_processed);
            job.last_window = Some(plan.window);
        }

        if outcome.end_of_file {
            job.total = Some(job.processed);
            job.transition(JobState::Completed)?;
            info!(processed = job.processed, "Import job completed");
        }

        Ok(Self::import_progress(&job, outcome.row_errors, outcome.warnings))
    }

    /// The window the caller should submit next, or `None` once done.
    ///
    /// # Errors
    ///
    /// - [`Error::JobNotFound`] for unknown ids
    /// - [`Error::InvalidWindow`] if `limit` is zero or above the maximum
    /// - [`Error::InvalidState`] for failed or export jobs
    pub fn next_import_window(&self, job_id: &JobId, limit: usize) -> Result<Option<ChunkWindow>> {
        if limit == 0 || limit > self.config.max_window_limit {
            return Err(Error::InvalidWindow(format!(
                "limit must be between 1 and {}, got {limit}",
                self.config.max_window_limit
            )));
        }
        let handle = self.handle(job_id)?;
        let job = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Self::expect_kind(&job, JobKind::Import)?;

        match job.state {
            JobState::Completed => Ok(None),
            JobState::Failed => Err(Self::invalid_state(&job)),
            JobState::Pending | JobState::Running => Ok(job
                .file_name
                .as_ref()
                .map(|file| ChunkWindow::new(file.clone(), job.next_offset(), limit))),
        }
    }

    /// Returns a snapshot of a job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] for unknown ids.
    pub fn job(&self, job_id: &JobId) -> Result<Job> {
        let handle = self.handle(job_id)?;
        let job = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(job.clone())
    }

    /// Returns snapshots of all jobs, oldest first.
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        let handles: Vec<Arc<Mutex<Job>>> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let mut jobs: Vec<Job> = handles
            .iter()
            .map(|h| h.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        jobs
    }

    /// Returns the finished export artifact.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the export job is completed
    /// - [`Error::FileNotFound`] if the artifact was already reclaimed
    pub fn download(&self, job_id: &JobId) -> Result<ChunkArtifact> {
        let job = self.job(job_id)?;
        Self::expect_kind(&job, JobKind::Export)?;
        let key = match (&job.state, &job.artifact_key) {
            (JobState::Completed, Some(key)) => key,
            _ => return Err(Self::invalid_state(&job)),
        };
        self.store
            .stat(key)?
            .ok_or_else(|| Error::FileNotFound(key.clone()))
    }

    fn insert(&self, job: Job) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.job_id.clone(), Arc::new(Mutex::new(job)));
    }

    fn handle(&self, job_id: &JobId) -> Result<Arc<Mutex<Job>>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))
    }

    fn expect_kind(job: &Job, kind: JobKind) -> Result<()> {
        if job.kind == kind {
            Ok(())
        } else {
            Err(Error::InvalidState {
                job_id: job.job_id.to_string(),
                state: format!("an {} job", job.kind),
            })
        }
    }

    fn invalid_state(job: &Job) -> Error {
        Error::InvalidState {
            job_id: job.job_id.to_string(),
            state: job.state.to_string(),
        }
    }

    fn export_progress(job: &Job) -> ExportProgress {
        ExportProgress {
            processed: job.processed,
            total: job.total,
            done: job.is_done(),
            download_ready: job.is_done() && job.artifact_key.is_some(),
        }
    }

    fn import_progress(job: &Job, errors: Vec<RowError>, warnings: Vec<RowError>) -> ImportProgress {
        ImportProgress {
            processed: job.processed,
            total: job.total,
            done: job.is_done(),
            errors,
            warnings,
        }
    }
}
