//! Data models for datasync.
//!
//! This module contains the core data structures shared by the pipelines,
//! the chunk store, and the job orchestrator.

mod job;
mod row;
mod window;

pub use job::{Job, JobId, JobKind, JobState};
pub use row::{Row, RowError};
pub use window::ChunkWindow;
