//! XLSX codec.
//!
//! Only the first worksheet is read. Its first non-empty row is the header.
//! Data rows are taken by sheet position up to the last row of the sheet's
//! declared dimension, so blank rows inside the data range are kept and keep
//! the row numbering of everything after them.
//!
//! Empty values are written as formatted blank cells; Excel drops unformatted
//! empty cells, which would shrink the dimension past an all-empty last row.
//!
//! The container is a zip archive and cannot be streamed row by row, so each
//! windowed decode parses the whole worksheet and then slices the window out
//! of it. Files are bounded by the upload limit, which keeps this acceptable.

use crate::io::formats::Format;
use crate::io::formats::csv::{check_header, normalize_header, row_from_cells};
use crate::io::traits::{ByteStream, DecodedWindow, FormatCodec};
use crate::models::Row;
use crate::{Error, Result};
use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{Format as CellFormat, Workbook, XlsxError};

/// XLSX encoder/decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxCodec;

impl XlsxCodec {
    /// Creates a codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn encode_err(e: XlsxError) -> Error {
    Error::OperationFailed {
        operation: "xlsx_encode".to_string(),
        cause: e.to_string(),
    }
}

fn column_number(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| Error::OperationFailed {
        operation: "xlsx_encode".to_string(),
        cause: format!("column {index} exceeds the worksheet limit"),
    })
}

fn row_number(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| Error::OperationFailed {
        operation: "xlsx_encode".to_string(),
        cause: format!("row {index} exceeds the worksheet limit"),
    })
}

/// Reads a worksheet into a dense grid of trimmed cell texts.
///
/// Rows run from the sheet's first row to the later of the declared
/// dimension end and the last stored cell; columns span the stored cells.
fn sheet_lines(workbook: &mut Xlsx<ByteStream>, sheet_name: &str) -> Result<Vec<Vec<String>>> {
    let decode_err = |e: calamine::XlsxError| {
        Error::DecodeFailure(format!("worksheet '{sheet_name}': {e}"))
    };
    let mut reader = workbook.worksheet_cells_reader(sheet_name).map_err(decode_err)?;
    let declared_last_row = reader.dimensions().end.0;

    let mut cells = Vec::new();
    while let Some(cell) = reader.next_cell().map_err(decode_err)? {
        let value = Data::from(cell.get_value().clone());
        if matches!(value, Data::Empty) {
            continue;
        }
        cells.push((cell.get_position(), value.to_string().trim().to_string()));
    }
    if cells.is_empty() {
        return Ok(Vec::new());
    }

    let first_col = cells.iter().map(|((_, c), _)| *c).min().unwrap_or(0);
    let last_col = cells.iter().map(|((_, c), _)| *c).max().unwrap_or(0);
    let last_row = cells
        .iter()
        .map(|((r, _), _)| *r)
        .max()
        .unwrap_or(0)
        .max(declared_last_row);

    let width = (last_col - first_col) as usize + 1;
    let mut lines = vec![vec![String::new(); width]; last_row as usize + 1];
    for ((row, col), text) in cells {
        lines[row as usize][(col - first_col) as usize] = text;
    }
    Ok(lines)
}

impl FormatCodec for XlsxCodec {
    fn format(&self) -> Format {
        Format::Xlsx
    }

    fn encode(&self, rows: &[Row], columns: &[String], include_header: bool) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let header_format = CellFormat::new().set_bold();
        let blank_format = CellFormat::new().set_num_format("@");
        let worksheet = workbook.add_worksheet();

        let mut line = 0usize;
        if include_header {
            for (col, name) in columns.iter().enumerate() {
                worksheet
                    .write_string_with_format(0, column_number(col)?, name, &header_format)
                    .map_err(encode_err)?;
            }
            line += 1;
        }

        for row in rows {
            let row_num = row_number(line)?;
            for (col, value) in row.project(columns).into_iter().enumerate() {
                let col = column_number(col)?;
                if value.is_empty() {
                    worksheet
                        .write_blank(row_num, col, &blank_format)
                        .map_err(encode_err)?;
                } else {
                    worksheet
                        .write_string(row_num, col, value)
                        .map_err(encode_err)?;
                }
            }
            line += 1;
        }

        workbook.save_to_buffer().map_err(encode_err)
    }

    fn decode(
        &self,
        stream: ByteStream,
        expected: Option<&[String]>,
        offset: usize,
        limit: usize,
    ) -> Result<DecodedWindow> {
        let mut workbook =
            Xlsx::new(stream).map_err(|e| Error::CorruptFile(format!("not a workbook: {e}")))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| Error::CorruptFile("workbook has no worksheets".to_string()))?;
        let mut lines = sheet_lines(&mut workbook, &sheet_name)?.into_iter();

        let header = lines
            .by_ref()
            .find(|cells| cells.iter().any(|c| !c.is_empty()))
            .map(|cells| normalize_header(cells.iter().map(String::as_str)))
            .unwrap_or_default();
        check_header(&header, expected)?;

        let mut data = lines.skip(offset);

        let rows: Vec<Row> = data
            .by_ref()
            .take(limit)
            .map(|cells| row_from_cells(&header, cells.iter().map(String::as_str)))
            .collect();
        let end_of_file = rows.len() < limit || data.next().is_none();

        Ok(DecodedWindow {
            rows_consumed: rows.len(),
            rows,
            end_of_file,
            header,
        })
    }
}
