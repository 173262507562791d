//! Keyed in-memory record table.
//!
//! A generic entity: rows keyed by one column, kept in insertion order, and
//! optionally persisted as JSON lines. Imports upsert by key, so replaying a
//! window leaves the table unchanged.

use crate::io::traits::{ApplyOutcome, RowSink, RowSource};
use crate::io::validation::ValidationIssue;
use crate::models::Row;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct TableState {
    rows: Vec<Row>,
    index: HashMap<String, usize>,
    dirty: bool,
}

impl TableState {
    fn upsert(&mut self, key: String, row: Row) -> ApplyOutcome {
        self.dirty = true;
        if let Some(&pos) = self.index.get(&key) {
            self.rows[pos] = row;
            ApplyOutcome::Updated
        } else {
            self.index.insert(key, self.rows.len());
            self.rows.push(row);
            ApplyOutcome::Inserted
        }
    }
}

/// A keyed table usable as both [`RowSource`] and [`RowSink`].
#[derive(Debug)]
pub struct RecordTable {
    key_column: String,
    columns: Vec<String>,
    required: Vec<String>,
    path: Option<PathBuf>,
    state: RwLock<TableState>,
}

impl RecordTable {
    /// Creates an empty, unpersisted table.
    ///
    /// The key column is always required and is added to `columns` if it
    /// is not listed.
    #[must_use]
    pub fn new<I, S>(key_column: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_column = key_column.into();
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if !columns.contains(&key_column) {
            columns.insert(0, key_column.clone());
        }
        Self {
            required: vec![key_column.clone()],
            key_column,
            columns,
            path: None,
            state: RwLock::new(TableState::default()),
        }
    }

    /// Opens a table persisted at `path`, loading existing rows.
    ///
    /// A missing file yields an empty table that is created on first flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open<I, S>(path: impl Into<PathBuf>, key_column: impl Into<String>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(key_column, columns);
        let path = path.into();
        if path.exists() {
            let rows = load_rows(&path)?;
            info!(path = %path.display(), rows = rows.len(), "Loaded record table");
            for row in rows {
                table.insert(row);
            }
        }
        let state = table.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.dirty = false;
        table.path = Some(path);
        Ok(table)
    }

    /// Column names found in a persisted table, in first-seen order.
    ///
    /// Returns an empty list if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn discover_columns(path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut columns: Vec<String> = Vec::new();
        for row in load_rows(path)? {
            for (column, _) in row.iter() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }
        Ok(columns)
    }

    /// Marks additional columns as required (non-empty on import).
    #[must_use]
    pub fn with_required<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            let column = column.into();
            if !self.required.contains(&column) {
                self.required.push(column);
            }
        }
        self
    }

    /// The key column.
    #[must_use]
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Inserts or replaces a row by key, keeping only declared columns.
    ///
    /// Rows without a key value are stored under the empty key.
    pub fn insert(&self, row: Row) -> ApplyOutcome {
        let key = row.get(&self.key_column).unwrap_or("").trim().to_string();
        let projected = self.project(&row);
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .upsert(key, projected)
    }

    /// Looks up a row by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Row> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.index.get(key).map(|&pos| state.rows[pos].clone())
    }

    /// Returns a snapshot of all rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .clone()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the table to its backing file, if it has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        write_rows(path, &state.rows)?;
        state.dirty = false;
        debug!(path = %path.display(), rows = state.rows.len(), "Saved record table");
        Ok(())
    }

    fn project(&self, row: &Row) -> Row {
        let mut projected = Row::new();
        for column in &self.columns {
            projected.set(column.clone(), row.get(column).unwrap_or(""));
        }
        projected
    }
}

fn table_err(operation: &str, cause: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: cause.to_string(),
    }
}

fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let file = fs::File::open(path).map_err(|e| table_err("load_table", e))?;
    let mut rows = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| table_err("load_table", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .map_err(|e| table_err("load_table", format!("line {}: {e}", n + 1)))?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_rows(path: &Path, rows: &[Row]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| table_err("save_table", e))?;
    }
    let tmp = path.with_extension("jsonl.tmp");
    let file = fs::File::create(&tmp).map_err(|e| table_err("save_table", e))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row).map_err(|e| table_err("save_table", e))?;
        writer
            .write_all(b"\n")
            .map_err(|e| table_err("save_table", e))?;
    }
    writer.flush().map_err(|e| table_err("save_table", e))?;
    fs::rename(&tmp, path).map_err(|e| table_err("save_table", e))
}

impl RowSource for RecordTable {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn count(&self) -> Result<usize> {
        Ok(self.len())
    }

    fn fetch(&self, cursor: usize, limit: usize) -> Result<Vec<Row>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.rows.iter().skip(cursor).take(limit).cloned().collect())
    }
}

impl RowSink for RecordTable {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn validate(&self, row: &Row) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for column in &self.required {
            if row.get(column).is_none_or(|v| v.trim().is_empty()) {
                issues.push(ValidationIssue::error(column.as_str(), "must not be empty"));
            }
        }
        for column in &self.columns {
            if let Some(value) = row.get(column) {
                if !value.is_empty() && value.trim() != value {
                    issues.push(ValidationIssue::warning(
                        column.as_str(),
                        "has leading or trailing whitespace",
                    ));
                }
            }
        }
        issues
    }

    fn apply(&self, row: &Row) -> std::result::Result<ApplyOutcome, String> {
        if row.get(&self.key_column).is_none_or(|v| v.trim().is_empty()) {
            return Err(format!("{}: missing key", self.key_column));
        }
        Ok(self.insert(row.clone()))
    }

    fn flush(&self) -> Result<()> {
        let dirty = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .dirty;
        if dirty { self.save() } else { Ok(()) }
    }
}
