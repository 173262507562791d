//! Import and export command handlers.
//!
//! Both commands drive a [`JobOrchestrator`] window by window against a
//! JSON-lines [`RecordTable`], the same way an HTTP front end would.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use datasync::config::DataSyncConfig;
use datasync::io::{ExportRequest, Format, ImportRequest, codec_for};
use datasync::models::RowError;
use datasync::storage::{ChunkStore, FilesystemChunkStore};
use datasync::{EntityRegistry, Error, JobOrchestrator, RecordTable, Result};

use super::TableArgs;

/// Row errors printed after an import; the rest are only counted.
const MAX_ERRORS_SHOWN: usize = 10;

/// Executes the export command.
pub fn cmd_export(
    config: &DataSyncConfig,
    table: &TableArgs,
    format: String,
    columns: Option<Vec<String>>,
    output: Option<PathBuf>,
    chunk_size: Option<usize>,
) -> Result<()> {
    if !table.path.exists() {
        return Err(Error::FileNotFound(table.path.display().to_string()));
    }
    let declared = RecordTable::discover_columns(&table.path)?;
    let records = Arc::new(RecordTable::open(&table.path, table.key.as_str(), declared)?);

    let mut orchestrator_config = config.orchestrator();
    if let Some(size) = chunk_size {
        orchestrator_config = orchestrator_config.with_export_chunk_size(size);
    }
    let orchestrator = build_orchestrator(config, &table.entity, records, orchestrator_config)?;

    let mut request = ExportRequest::new(format);
    if let Some(columns) = columns {
        request = request.with_columns(columns);
    }
    let job_id = orchestrator.start_export(&table.entity, &request)?;

    loop {
        let progress = orchestrator.step_export(&job_id)?;
        eprintln!(
            "Exported {}/{} rows",
            progress.processed,
            progress.total.map_or_else(|| "?".to_string(), |t| t.to_string())
        );
        if progress.done {
            break;
        }
    }

    let artifact = orchestrator.download(&job_id)?;
    println!("Job: {job_id}");
    println!("Artifact: {} ({} bytes)", artifact.path.display(), artifact.size_bytes);

    if let Some(output) = output {
        std::fs::copy(&artifact.path, &output).map_err(|e| Error::OperationFailed {
            operation: "copy_artifact".to_string(),
            cause: format!("{}: {e}", output.display()),
        })?;
        println!("Written to {}", output.display());
    }

    Ok(())
}

/// Executes the import command.
pub fn cmd_import(
    config: &DataSyncConfig,
    table: &TableArgs,
    file: PathBuf,
    format: Option<String>,
    limit: usize,
) -> Result<()> {
    let format = match format {
        Some(f) => f.parse::<Format>()?,
        None => Format::from_path(&file)?,
    };
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| Error::Validation(format!("invalid file name: {}", file.display())))?;

    let mut declared = RecordTable::discover_columns(&table.path)?;
    for column in read_header(&file, format)? {
        if !declared.contains(&column) {
            declared.push(column);
        }
    }
    let records = Arc::new(RecordTable::open(&table.path, table.key.as_str(), declared)?);
    let store: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(&config.chunk_dir)?);
    let registry = EntityRegistry::new().with_entity(table.entity.as_str(), Arc::clone(&records));
    let orchestrator = JobOrchestrator::new(
        Arc::clone(&store),
        Arc::new(registry),
        config.orchestrator(),
    );

    let mut upload = open_file(&file)?;
    store.stage_upload(&file_name, &mut upload)?;
    let job_id = orchestrator.start_import(&table.entity, &file_name, Some(format))?;

    let limit_i64 = i64::try_from(limit)
        .map_err(|_| Error::InvalidWindow(format!("limit {limit} is too large")))?;
    let mut errors: Vec<RowError> = Vec::new();
    let mut warnings = 0usize;
    let mut processed = 0usize;

    while let Some(window) = orchestrator.next_import_window(&job_id, limit)? {
        let offset = i64::try_from(window.offset)
            .map_err(|_| Error::InvalidWindow(format!("offset {} is too large", window.offset)))?;
        let progress =
            orchestrator.step_import(&job_id, &ImportRequest::new(window.file_name, offset, limit_i64))?;
        processed = progress.processed;
        warnings += progress.warnings.len();
        errors.extend(progress.errors);
        eprintln!("Imported {processed} rows ({} errors)", errors.len());
    }

    store.delete(&file_name)?;

    println!("Job: {job_id}");
    println!("Processed: {processed}");
    println!("Applied: {}", processed.saturating_sub(errors.len()));
    println!("Warnings: {warnings}");
    println!("Errors: {}", errors.len());
    for error in errors.iter().take(MAX_ERRORS_SHOWN) {
        println!("  {error}");
    }
    if errors.len() > MAX_ERRORS_SHOWN {
        println!("  ... and {} more", errors.len() - MAX_ERRORS_SHOWN);
    }
    println!("Table: {} ({} rows)", table.path.display(), records.len());

    Ok(())
}

fn build_orchestrator(
    config: &DataSyncConfig,
    entity: &str,
    records: Arc<RecordTable>,
    orchestrator_config: datasync::OrchestratorConfig,
) -> Result<JobOrchestrator> {
    let store: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(&config.chunk_dir)?);
    let registry = EntityRegistry::new().with_entity(entity, records);
    Ok(JobOrchestrator::new(store, Arc::new(registry), orchestrator_config))
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound(path.display().to_string()),
        _ => Error::OperationFailed {
            operation: "open_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        },
    })
}

/// Reads the header of a local file so a new table can adopt its columns.
fn read_header(path: &Path, format: Format) -> Result<Vec<String>> {
    let decoded = codec_for(format).decode(Box::new(open_file(path)?), None, 0, 1)?;
    Ok(decoded.header)
}
