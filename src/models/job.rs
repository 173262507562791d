//! Job types and identifiers.

use crate::io::formats::Format;
use crate::models::ChunkWindow;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an export or import job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a job ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, time-ordered job ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().simple().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Direction of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Records flow from a source into a downloadable file.
    Export,
    /// Records flow from an uploaded file into a sink.
    Import,
}

impl JobKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Export => "export",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a job.
///
/// Transitions are monotonic: `Pending → Running → Completed | Failed`, and
/// `Pending → Failed`. Terminal states never regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, no window processed yet.
    #[default]
    Pending,
    /// At least one window processed.
    Running,
    /// All windows processed.
    Completed,
    /// Aborted by a fatal first-window error.
    Failed,
}

impl JobState {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether moving to `next` respects the lifecycle ordering.
    ///
    /// Staying in the same non-terminal state is allowed.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, _) => true,
            (Self::Running, Self::Running | Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One export or import run.
///
/// Owned by the job orchestrator; pipelines only report outcomes that the
/// orchestrator folds into the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier.
    pub job_id: JobId,
    /// Export or import.
    pub kind: JobKind,
    /// File format of the artifact or upload.
    pub format: Format,
    /// Lifecycle state.
    pub state: JobState,
    /// Name of the registered entity plugin.
    pub entity: String,
    /// Ordered columns written (export) or required (import).
    pub columns: Vec<String>,
    /// Row count, when known.
    pub total: Option<usize>,
    /// Rows handled so far, success or failure.
    pub processed: usize,
    /// Staged upload name (import only).
    pub file_name: Option<String>,
    /// Next source position to fetch (export only).
    pub cursor: usize,
    /// Last accepted import window, kept so it can be replayed.
    pub last_window: Option<ChunkWindow>,
    /// Length of the export staging artifact after the last committed window.
    #[serde(default)]
    pub staged_bytes: u64,
    /// Final artifact key once the export completed.
    pub artifact_key: Option<String>,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Last update timestamp (Unix epoch seconds).
    pub updated_at: u64,
}

impl Job {
    /// Creates a pending export job.
    #[must_use]
    pub fn export(entity: impl Into<String>, format: Format, columns: Vec<String>) -> Self {
        Self::pending(JobKind::Export, entity.into(), format, columns, None)
    }

    /// Creates a pending import job for a staged file.
    #[must_use]
    pub fn import(
        entity: impl Into<String>,
        format: Format,
        columns: Vec<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self::pending(
            JobKind::Import,
            entity.into(),
            format,
            columns,
            Some(file_name.into()),
        )
    }

    fn pending(
        kind: JobKind,
        entity: String,
        format: Format,
        columns: Vec<String>,
        file_name: Option<String>,
    ) -> Self {
        let now = crate::current_timestamp();
        Self {
            job_id: JobId::generate(),
            kind,
            format,
            state: JobState::Pending,
            entity,
            columns,
            total: None,
            processed: 0,
            file_name,
            cursor: 0,
            last_window: None,
            staged_bytes: 0,
            artifact_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the job to `next`, rejecting regressions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the transition is not allowed.
    pub fn transition(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidState {
                job_id: self.job_id.to_string(),
                state: format!("{} and cannot become {next}", self.state),
            });
        }
        self.state = next;
        self.touch();
        Ok(())
    }

    /// Adds attempted rows to `processed`, keeping `processed <= total`.
    pub fn record_processed(&mut self, rows: usize) {
        self.processed += rows;
        if let Some(total) = self.total {
            if self.processed > total {
                self.total = Some(self.processed);
            }
        }
        self.touch();
    }

    /// Sets `total`, never below what was already processed.
    pub fn set_total(&mut self, total: usize) {
        self.total = Some(total.max(self.processed));
        self.touch();
    }

    /// Returns whether the job reached a terminal state successfully.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == JobState::Completed
    }

    /// Offset of the next import window.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.last_window.as_ref().map_or(0, ChunkWindow::end)
    }

    /// Percentage of rows processed, when `total` is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_complete(&self) -> Option<f32> {
        self.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.processed as f32 / total as f32) * 100.0
            }
        })
    }

    fn touch(&mut self) {
        self.updated_at = crate::current_timestamp().max(self.created_at);
    }
}
