//! Source formats and their readers.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use crate::errors::IngestError;
use crate::{Cell, LINE_COLUMN, Table, iterator, utils};

/// The closed set of payload formats we accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// An Excel workbook (`.xlsx`); only the first worksheet is read.
    Spreadsheet,
    /// Comma-separated values (`.csv`) with a header record.
    CommaSeparated,
    /// One value per line (`.txt`).
    LineText,
}

impl SourceKind {
    /// Picks the format from the extension of `filename` (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, IngestError> {
        let extension = match filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => String::new(),
        };
        match extension.as_str() {
            "xlsx" => Ok(Self::Spreadsheet),
            "csv" => Ok(Self::CommaSeparated),
            "txt" => Ok(Self::LineText),
            _ => Err(IngestError::UnsupportedExtension { extension }),
        }
    }

    /// Reads `bytes` as this format.
    pub fn read(self, bytes: &[u8]) -> Result<Table, IngestError> {
        match self {
            Self::Spreadsheet => read_spreadsheet(bytes),
            Self::CommaSeparated => read_csv(bytes),
            Self::LineText => read_lines(bytes),
        }
    }
}

fn read_lines(bytes: &[u8]) -> Result<Table, IngestError> {
    let text = std::str::from_utf8(bytes)?;
    let rows = iterator::Lines::new(text)
        .map(|line| vec![Cell::Text(line.to_owned())])
        .collect();
    Ok(Table::new(vec![LINE_COLUMN.to_owned()], rows))
}

fn read_csv(bytes: &[u8]) -> Result<Table, IngestError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| column_name(i, name))
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(utils::classify).collect());
    }
    Ok(Table::new(columns, rows))
}

fn read_spreadsheet(bytes: &[u8]) -> Result<Table, IngestError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(IngestError::EmptyWorkbook)??;

    let mut rows = range.rows();
    let columns = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| column_name(i, &cell.to_string()))
            .collect(),
        None => Vec::new(),
    };
    let rows = rows.map(|row| row.iter().map(spreadsheet_cell).collect()).collect();
    Ok(Table::new(columns, rows))
}

fn spreadsheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(v) => Cell::Int(*v),
        Data::Float(v) if v.is_nan() => Cell::Empty,
        Data::Float(v) => Cell::Float(*v),
        Data::Bool(v) => Cell::Bool(*v),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(at) => Cell::Text(at.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn column_name(index: usize, raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Unnamed: {index}")
    } else {
        trimmed.to_owned()
    }
}
