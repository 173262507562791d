//! Metric names and conversion helpers.
//!
//! Metrics are emitted through the `metrics` facade. No recorder is installed
//! by this crate; an embedding application may install one to collect them.

use metrics::{Unit, describe_counter, describe_histogram};
use std::time::Duration;

/// Rows applied by import windows.
pub const ROWS_IMPORTED: &str = "datasync_rows_imported_total";
/// Rows written by export windows.
pub const ROWS_EXPORTED: &str = "datasync_rows_exported_total";
/// Rows rejected by validation or apply.
pub const ROW_ERRORS: &str = "datasync_row_errors_total";
/// Per-window processing time.
pub const WINDOW_DURATION: &str = "datasync_window_duration_ms";
/// Artifacts removed by the reclamation sweep.
pub const SWEEP_DELETED: &str = "datasync_sweep_deleted_total";
/// Reclamation sweep duration.
pub const SWEEP_DURATION: &str = "datasync_sweep_duration_ms";

/// Registers descriptions for every metric the crate emits.
pub fn describe() {
    describe_counter!(ROWS_IMPORTED, Unit::Count, "Rows applied by import windows");
    describe_counter!(ROWS_EXPORTED, Unit::Count, "Rows written by export windows");
    describe_counter!(ROW_ERRORS, Unit::Count, "Rows rejected during import");
    describe_histogram!(WINDOW_DURATION, Unit::Milliseconds, "Time spent per window");
    describe_counter!(SWEEP_DELETED, Unit::Count, "Chunk artifacts reclaimed");
    describe_histogram!(SWEEP_DURATION, Unit::Milliseconds, "Reclamation sweep duration");
}

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
pub(crate) fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// Converts usize to u64 for counters.
#[inline]
pub(crate) fn usize_to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
