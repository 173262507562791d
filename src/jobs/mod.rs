//! Job orchestration.
//!
//! The orchestrator owns every [`Job`](crate::models::Job) and is the only
//! component that mutates one. Callers drive a job window by window:
//!
//! ```rust,ignore
//! let job_id = orchestrator.start_import("users", "users.csv", None)?;
//! while let Some(window) = orchestrator.next_import_window(&job_id, 500)? {
//!     let request = ImportRequest::new(window.file_name, window.offset as i64, 500);
//!     let progress = orchestrator.step_import(&job_id, &request)?;
//!     report(progress.processed, progress.total, &progress.errors);
//! }
//! ```

mod orchestrator;

pub use orchestrator::{
    DEFAULT_EXPORT_CHUNK_SIZE, DEFAULT_MAX_WINDOW_LIMIT, ExportProgress, ImportProgress,
    JobOrchestrator, OrchestratorConfig,
};
