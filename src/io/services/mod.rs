//! Export and import pipelines.
//!
//! Each pipeline processes exactly one window per call and reports what it
//! did; the job orchestrator folds the outcome into the job.

pub mod export;
pub mod import;

pub use export::{ExportPipeline, ExportWindowOutcome};
pub use import::{ImportPipeline, ImportWindowOutcome};
