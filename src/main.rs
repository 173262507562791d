//! Binary entry point for datasync.
//!
//! This binary provides the CLI interface for chunked imports, exports and
//! chunk reclamation.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use datasync::config::DataSyncConfig;
use datasync::observability::{self, LoggingConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Datasync - chunked CSV/XLSX import and export.
#[derive(Parser)]
#[command(name = "datasync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Export a table to CSV or XLSX, one window at a time.
    Export {
        /// Entity name the table is registered under.
        #[arg(short, long, default_value = "records")]
        entity: String,

        /// JSON-lines table file to export.
        #[arg(short, long)]
        table: PathBuf,

        /// Export format: csv or xlsx.
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Columns to export (comma-separated); all columns if omitted.
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Key column of the table.
        #[arg(short, long, default_value = "id")]
        key: String,

        /// Copy the finished artifact here.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows per export window (overrides config).
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Import a CSV or XLSX file into a table, one window at a time.
    Import {
        /// File to import.
        file: PathBuf,

        /// Entity name the table is registered under.
        #[arg(short, long, default_value = "records")]
        entity: String,

        /// JSON-lines table file to import into (created if missing).
        #[arg(short, long)]
        table: PathBuf,

        /// File format: csv or xlsx (detected from the extension if omitted).
        #[arg(short, long)]
        format: Option<String>,

        /// Key column of the table.
        #[arg(short, long, default_value = "id")]
        key: String,

        /// Rows per import window.
        #[arg(short, long, default_value = "500")]
        limit: usize,
    },

    /// Delete stale chunk artifacts once.
    ClearChunks {
        /// Retention threshold in hours (overrides config).
        #[arg(long)]
        older_than_hours: Option<u64>,

        /// Show what would be deleted without deleting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the daily chunk sweep in the foreground until Ctrl-C.
    Schedule,

    /// Show the effective configuration.
    Config,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match DataSyncConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(LoggingConfig::from_settings(&config.logging, cli.verbose))
    {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(
    command: Commands,
    config: DataSyncConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Export {
            entity,
            table,
            format,
            columns,
            key,
            output,
            chunk_size,
        } => commands::cmd_export(
            &config,
            &commands::TableArgs::new(entity, table, key),
            format,
            columns,
            output,
            chunk_size,
        )?,

        Commands::Import {
            file,
            entity,
            table,
            format,
            key,
            limit,
        } => commands::cmd_import(
            &config,
            &commands::TableArgs::new(entity, table, key),
            file,
            format,
            limit,
        )?,

        Commands::ClearChunks {
            older_than_hours,
            dry_run,
        } => commands::cmd_clear_chunks(&config, older_than_hours, dry_run)?,

        Commands::Schedule => commands::cmd_schedule(&config).await?,

        Commands::Config => commands::cmd_config(&config)?,
    }
    Ok(())
}
