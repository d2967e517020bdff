//! Tabular ingestion for the courier send pipeline.
//!
//! This crate turns an uploaded payload (`.xlsx`, `.csv` or `.txt`) or a raw
//! block of manually entered text into a [`Table`] of [`Cell`]s with column
//! identity. The send pipeline never sees the source format, only the table
//! and the messages composed from it.
//!
//! # Quick start
//!
//! ```rust
//! use courier_ingest::{ingest, SendMode};
//!
//! let csv = b"name,phone\nalice,5551234.0\nbob,\n";
//! let table = ingest("contacts.csv", csv).unwrap();
//! let plan = table.plan(SendMode::Rows);
//! assert_eq!(plan[0].messages, vec!["name: alice | phone: 5551234", "name: bob"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Error types for ingestion.
pub mod errors;
pub mod table;
mod iterator;
mod source;
mod utils;

pub use errors::IngestError;
pub use source::SourceKind;
pub use table::{Batch, Cell, SendMode, Table, TableCell};

/// Name of the single column produced from line-delimited text.
pub const LINE_COLUMN: &str = "data";

/// Parses `bytes` according to the extension of `filename`.
///
/// Fails with [`IngestError::UnsupportedExtension`] before looking at the
/// payload when the extension is not one of `xlsx`, `csv` or `txt`.
pub fn ingest(filename: &str, bytes: &[u8]) -> Result<Table, IngestError> {
    let kind = SourceKind::from_filename(filename)?;
    let table = kind.read(bytes)?;
    tracing::debug!(
        "[ingest] {filename}: {kind:?}, {} column(s), {} row(s)",
        table.columns().len(),
        table.len()
    );
    Ok(table)
}

/// Builds a single-column table from a manually entered block of text.
///
/// Every trimmed, non-blank line becomes one row of the [`LINE_COLUMN`] column.
pub fn ingest_text(text: &str) -> Table {
    let rows = iterator::Lines::new(text)
        .map(|line| vec![Cell::Text(line.to_owned())])
        .collect();
    Table::new(vec![LINE_COLUMN.to_owned()], rows)
}
