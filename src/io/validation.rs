//! Request validation and row issue types.
//!
//! Export and import requests are validated as pure functions before any
//! side-effecting call: a failed check never creates or advances a job and
//! never touches the chunk store.

use super::formats::Format;
use crate::models::ChunkWindow;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSeverity {
    /// Issue noted, the row is still applied.
    Warning,
    /// The row is rejected.
    Error,
}

/// A validation issue found on a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// The column that has an issue.
    pub field: String,
    /// Description of the issue.
    pub message: String,
    /// Severity of the issue.
    pub severity: ValidationSeverity,
}

impl ValidationIssue {
    /// Creates a warning issue.
    #[must_use]
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }

    /// Creates an error issue.
    #[must_use]
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Returns `true` if this issue rejects the row.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == ValidationSeverity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Joins the rejecting issues of a row into one reason, if any.
#[must_use]
pub fn rejection_reason(issues: &[ValidationIssue]) -> Option<String> {
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.is_error())
        .map(ToString::to_string)
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

/// Incoming export request.
///
/// Every field is optional at the type level so that missing required
/// fields surface as [`Error::Validation`] instead of a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// `csv` or `xlsx` (required).
    #[serde(default)]
    pub format: Option<String>,
    /// Columns to export, in order (optional).
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

impl ExportRequest {
    /// Creates a request for the given format and all columns.
    #[must_use]
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            columns: None,
        }
    }

    /// Restricts the export to the given columns.
    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// A validated export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    /// Artifact format.
    pub format: Format,
    /// Requested columns, `None` for all entity columns.
    pub columns: Option<Vec<String>>,
}

/// Validates an export request.
///
/// # Errors
///
/// - [`Error::Validation`] if `format` is missing, a column name is empty,
///   or a column is listed twice
/// - [`Error::UnsupportedFormat`] if `format` is neither `csv` nor `xlsx`
pub fn validate_export_request(request: &ExportRequest) -> Result<ExportPlan> {
    let raw_format = request
        .format
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| Error::Validation("format is required".to_string()))?;
    let format = Format::from_str(raw_format)?;

    let columns = match &request.columns {
        None => None,
        Some(columns) => {
            if let Some(pos) = columns.iter().position(|c| c.trim().is_empty()) {
                return Err(Error::Validation(format!(
                    "columns.{pos} must be a non-empty string"
                )));
            }
            let trimmed: Vec<String> = columns.iter().map(|c| c.trim().to_string()).collect();
            for (pos, column) in trimmed.iter().enumerate() {
                if trimmed[..pos].contains(column) {
                    return Err(Error::Validation(format!(
                        "columns.{pos} duplicates '{column}'"
                    )));
                }
            }
            Some(trimmed)
        },
    };

    Ok(ExportPlan { format, columns })
}

/// Incoming import request for one window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Staged upload name (required).
    #[serde(default)]
    pub file_name: Option<String>,
    /// First data row, `>= 0` (required).
    #[serde(default)]
    pub offset: Option<i64>,
    /// Window size, `> 0` (required).
    #[serde(default)]
    pub limit: Option<i64>,
    /// Known row count (optional).
    #[serde(default)]
    pub total: Option<i64>,
}

impl ImportRequest {
    /// Creates a request for one window.
    #[must_use]
    pub fn new(file_name: impl Into<String>, offset: i64, limit: i64) -> Self {
        Self {
            file_name: Some(file_name.into()),
            offset: Some(offset),
            limit: Some(limit),
            total: None,
        }
    }

    /// Sets the known row count.
    #[must_use]
    pub const fn with_total(mut self, total: i64) -> Self {
        self.total = Some(total);
        self
    }
}

/// A validated import request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    /// The window to process.
    pub window: ChunkWindow,
    /// Known row count, if the caller supplied one.
    pub total: Option<usize>,
}

/// Validates an import request.
///
/// # Errors
///
/// - [`Error::Validation`] if `file_name` is missing or `total` is negative
/// - [`Error::InvalidWindow`] if `offset`/`limit` are missing, `offset < 0`,
///   `limit <= 0`, or `limit > max_limit`
pub fn validate_import_request(request: &ImportRequest, max_limit: usize) -> Result<ImportPlan> {
    let file_name = request
        .file_name
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| Error::Validation("file_name is required".to_string()))?;

    let offset = request
        .offset
        .ok_or_else(|| Error::InvalidWindow("offset is required".to_string()))?;
    let limit = request
        .limit
        .ok_or_else(|| Error::InvalidWindow("limit is required".to_string()))?;

    let offset = usize::try_from(offset)
        .map_err(|_| Error::InvalidWindow(format!("offset must be >= 0, got {offset}")))?;
    let limit = usize::try_from(limit)
        .ok()
        .filter(|l| *l > 0)
        .ok_or_else(|| Error::InvalidWindow(format!("limit must be > 0, got {limit}")))?;
    if limit > max_limit {
        return Err(Error::InvalidWindow(format!(
            "limit {limit} exceeds maximum of {max_limit}"
        )));
    }

    let total = match request.total {
        None => None,
        Some(t) => Some(
            usize::try_from(t)
                .map_err(|_| Error::Validation(format!("total must be >= 0, got {t}")))?,
        ),
    };

    Ok(ImportPlan {
        window: ChunkWindow::new(file_name, offset, limit),
        total,
    })
}
