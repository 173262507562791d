//! CSV codec.
//!
//! The first record is always the header. Data rows are addressed by their
//! 0-based position after the header; blank lines are skipped by the reader
//! and never count as rows.

use crate::io::traits::{ByteStream, DecodedWindow, FormatCodec};
use crate::io::formats::Format;
use crate::models::Row;
use crate::{Error, Result};

/// CSV encoder/decoder.
#[derive(Debug, Clone, Copy)]
pub struct CsvCodec {
    delimiter: u8,
}

impl CsvCodec {
    /// Creates a comma-delimited codec.
    #[must_use]
    pub const fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Sets the field delimiter.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl Default for CsvCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalizes header cells: trims whitespace and a leading byte-order mark.
pub(crate) fn normalize_header<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<String> {
    cells
        .map(|c| c.trim_start_matches('\u{feff}').trim().to_string())
        .collect()
}

/// Checks a header against the expected columns.
///
/// Extra header columns are allowed; only missing ones are reported.
pub(crate) fn check_header(header: &[String], expected: Option<&[String]>) -> Result<()> {
    if header.iter().all(String::is_empty) {
        return Err(Error::CorruptFile("missing header row".to_string()));
    }
    let Some(expected) = expected else {
        return Ok(());
    };
    let missing: Vec<String> = expected
        .iter()
        .filter(|column| !header.iter().any(|h| h == *column))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::ColumnMismatch {
            missing,
            found: header.to_vec(),
        })
    }
}

/// Builds a row from header names and positional values.
///
/// Short records are padded with empty values; cells past the header are
/// dropped.
pub(crate) fn row_from_cells<'a>(header: &[String], cells: impl Iterator<Item = &'a str>) -> Row {
    let mut cells = cells;
    let mut row = Row::new();
    for column in header {
        row.set(column.clone(), cells.next().unwrap_or(""));
    }
    row
}

impl FormatCodec for CsvCodec {
    fn format(&self) -> Format {
        Format::Csv
    }

    fn encode(&self, rows: &[Row], columns: &[String], include_header: bool) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .from_writer(Vec::new());

        let write_err = |e: csv::Error| Error::OperationFailed {
            operation: "csv_encode".to_string(),
            cause: e.to_string(),
        };

        if include_header {
            writer.write_record(columns).map_err(write_err)?;
        }
        for row in rows {
            writer.write_record(row.project(columns)).map_err(write_err)?;
        }

        writer.into_inner().map_err(|e| Error::OperationFailed {
            operation: "csv_encode".to_string(),
            cause: e.to_string(),
        })
    }

    fn decode(
        &self,
        stream: ByteStream,
        expected: Option<&[String]>,
        offset: usize,
        limit: usize,
    ) -> Result<DecodedWindow> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(stream);

        let header = normalize_header(
            reader
                .headers()
                .map_err(|e| Error::CorruptFile(format!("unreadable header: {e}")))?
                .iter(),
        );
        check_header(&header, expected)?;

        let mut record = csv::StringRecord::new();
        let mut position = 0usize;
        while position < offset {
            let more = reader
                .read_record(&mut record)
                .map_err(|e| Error::DecodeFailure(format!("data row {}: {e}", position + 1)))?;
            if !more {
                return Ok(DecodedWindow {
                    rows: Vec::new(),
                    rows_consumed: 0,
                    end_of_file: true,
                    header,
                });
            }
            position += 1;
        }

        let mut rows = Vec::with_capacity(limit.min(1024));
        while rows.len() < limit {
            let more = reader
                .read_record(&mut record)
                .map_err(|e| Error::DecodeFailure(format!("data row {}: {e}", position + 1)))?;
            if !more {
                break;
            }
            rows.push(row_from_cells(&header, record.iter()));
            position += 1;
        }

        // A full window is only the end when no record follows it. A broken
        // record after the window belongs to the next window's decode.
        let end_of_file = rows.len() < limit || matches!(reader.read_record(&mut record), Ok(false));

        Ok(DecodedWindow {
            rows_consumed: rows.len(),
            rows,
            end_of_file,
            header,
        })
    }
}
