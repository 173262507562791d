//! Daily sweep scheduling.
//!
//! The sweep fires once per day at a fixed UTC wall-clock time. The
//! scheduler runs each sweep to completion on a blocking thread before
//! computing the next trigger, so sweeps never overlap.

use super::sweep::ChunkSweeper;
use crate::{Error, Result};
use chrono::{DateTime, Days, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// A daily `HH:MM` trigger in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    at: NaiveTime,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self { at: NaiveTime::MIN }
    }
}

impl SweepSchedule {
    /// Creates a schedule from an hour and minute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the time is out of range.
    pub fn daily_at(hour: u32, minute: u32) -> Result<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(|at| Self { at })
            .ok_or_else(|| Error::Validation(format!("invalid sweep time {hour}:{minute:02}")))
    }

    /// Parses `HH:MM`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the value is not a valid time.
    pub fn parse(value: &str) -> Result<Self> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map(|at| Self { at })
            .map_err(|e| Error::Validation(format!("invalid sweep time '{value}': {e}")))
    }

    /// The next trigger strictly after `now`.
    #[must_use]
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.at).and_utc();
        if today > now {
            today
        } else {
            now.date_naive()
                .checked_add_days(Days::new(1))
                .map_or(today, |d| d.and_time(self.at).and_utc())
        }
    }

    /// Time to wait from `now` until the next trigger.
    #[must_use]
    pub fn wait_from(&self, now: DateTime<Utc>) -> Duration {
        (self.next_run_after(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl fmt::Display for SweepSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.at.hour(), self.at.minute())
    }
}

impl Serialize for SweepSchedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SweepSchedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Runs the sweep every day at the configured time until Ctrl-C.
///
/// A failed sweep is logged and the scheduler waits for the next trigger.
///
/// # Errors
///
/// Returns an error if the Ctrl-C handler cannot be installed.
pub async fn run_scheduler(sweeper: Arc<ChunkSweeper>) -> Result<()> {
    let schedule = sweeper.config().schedule;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let now = Utc::now();
        let next = schedule.next_run_after(now);
        info!(next_run = %next.to_rfc3339(), "Next chunk sweep scheduled");

        tokio::select! {
            () = tokio::time::sleep(schedule.wait_from(now)) => {
                let worker = Arc::clone(&sweeper);
                match tokio::task::spawn_blocking(move || worker.sweep(false)).await {
                    Ok(Ok(report)) => info!("{}", report.summary()),
                    Ok(Err(e)) => warn!(error = %e, "Scheduled chunk sweep failed"),
                    Err(e) => error!(error = %e, "Scheduled chunk sweep panicked"),
                }
            }
            signal = &mut shutdown => {
                signal.map_err(|e| Error::OperationFailed {
                    operation: "install_signal_handler".to_string(),
                    cause: e.to_string(),
                })?;
                info!("Shutdown signal received, stopping sweep scheduler");
                return Ok(());
            }
        }
    }
}
