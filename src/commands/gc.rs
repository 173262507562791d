//! Chunk sweep command handlers.

use std::sync::Arc;

use datasync::config::DataSyncConfig;
use datasync::gc::{ChunkSweeper, SweepReport, run_scheduler};
use datasync::storage::{ChunkStore, FilesystemChunkStore};

/// One-shot sweep.
///
/// # Examples
///
/// ```bash
/// # See what a sweep would reclaim
/// datasync clear-chunks --dry-run
///
/// # Reclaim everything older than six hours
/// datasync clear-chunks --older-than-hours 6
/// ```
pub fn cmd_clear_chunks(
    config: &DataSyncConfig,
    older_than_hours: Option<u64>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sweep_config = config.sweep.clone();
    if let Some(hours) = older_than_hours {
        sweep_config = sweep_config.with_retention_hours(hours);
    }

    println!("Datasync Chunk Sweep");
    println!("====================");
    println!();
    println!("Chunk dir: {}", config.chunk_dir.display());
    println!("Retention: {} hours", sweep_config.retention_hours);
    println!("Mode: {}", if dry_run { "dry-run" } else { "execute" });
    println!();

    let store: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(&config.chunk_dir)?);
    let sweeper = ChunkSweeper::new(store, sweep_config);
    let report = sweeper.sweep(dry_run)?;

    display_report(&report);
    Ok(())
}

/// Runs the daily sweep until Ctrl-C.
pub async fn cmd_schedule(config: &DataSyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(&config.chunk_dir)?);
    let sweeper = Arc::new(ChunkSweeper::new(store, config.sweep.clone()));

    println!(
        "Sweeping {} daily at {} UTC (retention {}h). Press Ctrl-C to stop.",
        config.chunk_dir.display(),
        config.sweep.schedule,
        config.sweep.retention_hours
    );
    run_scheduler(sweeper).await?;
    Ok(())
}

fn display_report(report: &SweepReport) {
    if report.has_deletions() {
        let action = if report.dry_run { "Would delete" } else { "Deleted" };
        println!("{action}:");
        for key in &report.deleted_keys {
            println!("  - {key}");
        }
        println!();
    }
    for error in &report.errors {
        println!("  ! {error}");
    }
    println!("{}", report.summary());
}
