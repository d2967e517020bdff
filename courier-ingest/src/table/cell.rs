use std::fmt;

use crate::utils;

/// One value of an ingested table, independent of the source format.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    /// A blank or missing value (`NaN`, `N/A`, empty string, …).
    Empty,
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean (spreadsheets only).
    Bool(bool),
    /// Anything else, as read.
    Text(String),
}

impl Cell {
    /// The text sent for this cell, or `None` when it should be skipped.
    ///
    /// Integral numbers never carry a decimal part, so `5.0` and `5` both
    /// render as `"5"`; `5.5` renders as `"5.5"`. Text is only trimmed:
    /// `"12.000"` typed by hand stays `"12.000"`.
    pub fn render(&self) -> Option<String> {
        let out = match self {
            Self::Empty => return None,
            Self::Int(v) => v.to_string(),
            Self::Float(v) => return utils::render_float(*v),
            Self::Bool(true) => "True".to_owned(),
            Self::Bool(false) => "False".to_owned(),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.to_owned()
            }
        };
        Some(out)
    }

    /// `true` if [`Cell::render`] would skip this cell.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Float(v) => v.is_nan(),
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.render().as_deref().unwrap_or(""))
    }
}

/// A cell together with the name of the column it belongs to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableCell<'a> {
    /// Header of the cell's column.
    pub column_name: &'a str,
    /// The raw value.
    pub value: &'a Cell,
}
