//! Format codecs for import/export.
//!
//! Each format implements the [`FormatCodec`] trait; [`codec_for`] is the
//! single dispatch point the pipelines use.

pub mod csv;
pub mod xlsx;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use super::traits::FormatCodec;

pub use self::csv::CsvCodec;
pub use self::xlsx::XlsxCodec;

/// Supported file formats for import/export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Comma-separated values with a header row.
    Csv,
    /// Office Open XML spreadsheet, first worksheet only.
    Xlsx,
}

impl Format {
    /// Returns all supported formats.
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::Csv, Self::Xlsx]
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    /// Returns the MIME type for this format.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// Detects format from file extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] if the extension is not recognized.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match ext.as_deref() {
            Some("csv" | "txt") => Ok(Self::Csv),
            Some("xlsx" | "xlsm") => Ok(Self::Xlsx),
            Some(ext) => Err(Error::UnsupportedFormat(format!(".{ext}"))),
            None => Err(Error::UnsupportedFormat(format!(
                "cannot determine format of '{}': no extension",
                path.display()
            ))),
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Returns the codec for a format.
#[must_use]
pub fn codec_for(format: Format) -> Box<dyn FormatCodec> {
    match format {
        Format::Csv => Box::new(CsvCodec::new()),
        Format::Xlsx => Box::new(XlsxCodec::new()),
    }
}
