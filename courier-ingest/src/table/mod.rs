//! The uniform table model every source is normalised into.

mod cell;
mod mode;

pub use cell::{Cell, TableCell};
pub use mode::SendMode;

/// Separator between the parts of a row-mode message.
pub const ROW_SEPARATOR: &str = " | ";

/// An ordered table of cells with named columns.
///
/// Every row holds exactly one cell per column; short rows are padded with
/// [`Cell::Empty`] on construction and long rows are truncated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows:    Vec<Vec<Cell>>,
}

/// A group of messages sent back to back.
///
/// Column mode produces one batch per column, row mode a single batch.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    /// Column name in column mode; `"rows"` in row mode.
    pub label:    String,
    /// Messages in send order; blank units are already dropped.
    pub messages: Vec<String>,
}

impl Table {
    /// Builds a table, normalising every row to `columns.len()` cells.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Column headers in source order.
    pub fn columns(&self) -> &[String] { &self.columns }

    /// All rows.
    pub fn rows(&self) -> &[Vec<Cell>] { &self.rows }

    /// Number of rows.
    pub fn len(&self) -> usize { self.rows.len() }

    /// `true` if the table has no rows.
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    /// Cells of column `index`, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = TableCell<'_>> {
        let column_name = self.columns.get(index).map(String::as_str).unwrap_or("");
        self.rows
            .iter()
            .filter_map(move |row| row.get(index))
            .map(move |value| TableCell { column_name, value })
    }

    /// Cells of one row paired with their column names.
    pub fn row_cells<'a>(&'a self, row: &'a [Cell]) -> impl Iterator<Item = TableCell<'a>> {
        self.columns
            .iter()
            .zip(row)
            .map(|(name, value)| TableCell { column_name: name, value })
    }

    /// Composes the row-mode message for `row`.
    ///
    /// Non-empty cells are rendered as `"column: value"` and joined with
    /// [`ROW_SEPARATOR`]; a single-column table yields the bare value.
    /// Returns `None` if no cell renders.
    pub fn compose_row(&self, row: &[Cell]) -> Option<String> {
        let bare = self.columns.len() == 1;
        let parts: Vec<String> = self
            .row_cells(row)
            .filter_map(|cell| {
                let value = cell.value.render()?;
                Some(if bare { value } else { format!("{}: {value}", cell.column_name) })
            })
            .collect();
        if parts.is_empty() { None } else { Some(parts.join(ROW_SEPARATOR)) }
    }

    /// The messages this table produces in `mode`, grouped into batches.
    pub fn plan(&self, mode: SendMode) -> Vec<Batch> {
        match mode {
            SendMode::Columns => (0..self.columns.len())
                .map(|i| Batch {
                    label:    self.columns[i].clone(),
                    messages: self.column(i).filter_map(|c| c.value.render()).collect(),
                })
                .collect(),
            SendMode::Rows => vec![Batch {
                label:    mode.as_str().to_owned(),
                messages: self.rows.iter().filter_map(|r| self.compose_row(r)).collect(),
            }],
        }
    }
}

impl Batch {
    /// Total number of messages across `batches`.
    pub fn total(batches: &[Batch]) -> usize {
        batches.iter().map(|b| b.messages.len()).sum()
    }
}
