//! Garbage collection for chunk artifacts.
//!
//! Staged uploads and export files are temporary. Abandoned jobs leave
//! them behind, so a daily sweep deletes every artifact older than the
//! retention threshold.
//!
//! # Example
//!
//! ```rust,ignore
//! use datasync::gc::{ChunkSweeper, run_scheduler};
//! use std::sync::Arc;
//!
//! let sweeper = Arc::new(ChunkSweeper::new(store, config.sweep.clone()));
//!
//! // One-shot sweep
//! let report = sweeper.sweep(false)?;
//! println!("{}", report.summary());
//!
//! // Or run daily until Ctrl-C
//! run_scheduler(sweeper).await?;
//! ```
//!
//! # Concurrency
//!
//! The sweep only removes artifacts older than the threshold (24 hours by
//! default), so it is safe to run while jobs are in flight: an active job's
//! artifacts are younger than that.

mod schedule;
mod sweep;

pub use schedule::{SweepSchedule, run_scheduler};
pub use sweep::{ChunkSweeper, DEFAULT_RETENTION_HOURS, SweepConfig, SweepReport};
