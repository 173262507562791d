//! Chunk reclamation sweep.
//!
//! Deletes chunk artifacts whose age exceeds the retention threshold. Each
//! deletion is independent: a failure is logged and recorded in the report,
//! and the sweep moves on to the next artifact.
//!
//! Stale artifacts come from [`ChunkStore::list_older_than`]; the sweep never
//! re-checks ages itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use datasync::gc::ChunkSweeper;
//!
//! let sweeper = ChunkSweeper::new(store, config.sweep.clone());
//!
//! // Dry run to see what would be reclaimed
//! let report = sweeper.sweep(true)?;
//! println!("{}", report.summary());
//! ```

use super::schedule::SweepSchedule;
use crate::Result;
use crate::observability::metrics::{
    SWEEP_DELETED, SWEEP_DURATION, duration_to_millis, u64_to_f64, usize_to_u64,
};
use crate::storage::ChunkStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Default retention threshold in hours, matching a once-daily sweep.
pub const DEFAULT_RETENTION_HOURS: u64 = 24;

const SECONDS_PER_HOUR: u64 = 3600;

/// Reclamation sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Artifacts strictly older than this many hours are deleted.
    pub retention_hours: u64,
    /// Daily trigger time.
    pub schedule: SweepSchedule,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            retention_hours: DEFAULT_RETENTION_HOURS,
            schedule: SweepSchedule::default(),
        }
    }
}

impl SweepConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retention threshold.
    #[must_use]
    pub const fn with_retention_hours(mut self, hours: u64) -> Self {
        self.retention_hours = hours;
        self
    }

    /// Sets the daily trigger time.
    #[must_use]
    pub const fn with_schedule(mut self, schedule: SweepSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Retention threshold in seconds.
    #[must_use]
    pub const fn threshold_secs(&self) -> u64 {
        self.retention_hours.saturating_mul(SECONDS_PER_HOUR)
    }
}

/// Result of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale artifacts found past the threshold.
    pub checked: usize,
    /// Artifacts deleted (or that would be, in a dry run).
    pub deleted: usize,
    /// Keys deleted (or that would be).
    pub deleted_keys: Vec<String>,
    /// Per-artifact failures; none of them aborted the sweep.
    pub errors: Vec<String>,
    /// Whether this was a dry run (nothing removed).
    pub dry_run: bool,
    /// Duration of the sweep in milliseconds.
    pub duration_ms: u64,
}

impl SweepReport {
    /// Returns `true` if any artifact was (or would be) deleted.
    #[must_use]
    pub const fn has_deletions(&self) -> bool {
        self.deleted > 0
    }

    /// Returns a human-readable summary of the sweep.
    #[must_use]
    pub fn summary(&self) -> String {
        let action = if self.dry_run {
            "would delete"
        } else {
            "deleted"
        };

        let mut line = if self.deleted == 0 {
            format!(
                "No stale chunks found ({}ms)",
                self.duration_ms
            )
        } else {
            format!(
                "{action} {} of {} stale chunks in {}ms",
                self.deleted, self.checked, self.duration_ms
            )
        };
        if !self.errors.is_empty() {
            line.push_str(&format!(", {} errors", self.errors.len()));
        }
        line
    }
}

/// Deletes stale artifacts from a [`ChunkStore`].
pub struct ChunkSweeper {
    store: Arc<dyn ChunkStore>,
    config: SweepConfig,
}

impl ChunkSweeper {
    /// Creates a sweeper.
    #[must_use]
    pub fn new(store: Arc<dyn ChunkStore>, config: SweepConfig) -> Self {
        Self { store, config }
    }

    /// Sweeps with the configured threshold at the current time.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store cannot be listed.
    pub fn sweep(&self, dry_run: bool) -> Result<SweepReport> {
        self.sweep_at(
            crate::current_timestamp(),
            self.config.threshold_secs(),
            dry_run,
        )
    }

    /// Deletes every artifact with `now - created_at > threshold_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store cannot be listed.
    #[instrument(
        name = "datasync.gc.sweep",
        skip(self),
        fields(component = "gc", operation = "sweep")
    )]
    pub fn sweep_at(&self, now: u64, threshold_secs: u64, dry_run: bool) -> Result<SweepReport> {
        let start = Instant::now();
        let mut report = SweepReport {
            dry_run,
            ..Default::default()
        };

        let stale = self.store.list_older_than(threshold_secs, now)?;
        report.checked = stale.len();

        for artifact in stale {
            debug!(
                key = %artifact.key,
                age_secs = artifact.age_at(now),
                "Stale chunk artifact"
            );

            if dry_run {
                report.deleted += 1;
                report.deleted_keys.push(artifact.key);
                continue;
            }

            match self.store.delete(&artifact.key) {
                Ok(true) => {
                    report.deleted += 1;
                    report.deleted_keys.push(artifact.key);
                },
                Ok(false) => {
                    warn!(key = %artifact.key, "Chunk artifact already gone");
                    report.errors.push(format!("{}: already gone", artifact.key));
                },
                Err(e) => {
                    warn!(key = %artifact.key, error = %e, "Failed to delete chunk artifact");
                    report.errors.push(format!("{}: {e}", artifact.key));
                },
            }
        }

        report.duration_ms = duration_to_millis(start.elapsed());

        if !dry_run {
            metrics::counter!(SWEEP_DELETED).increment(usize_to_u64(report.deleted));
        }
        metrics::histogram!(SWEEP_DURATION).record(u64_to_f64(report.duration_ms));

        info!(
            checked = report.checked,
            deleted = report.deleted,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            dry_run,
            "Chunk sweep completed"
        );

        Ok(report)
    }

    /// Returns the sweep configuration.
    #[must_use]
    pub const fn config(&self) -> &SweepConfig {
        &self.config
    }
}
