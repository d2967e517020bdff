use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a table is walked when composing outbound messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// Column by column, one message per non-empty cell.
    #[default]
    Columns,
    /// Row by row, one message per row joining its non-empty cells.
    Rows,
}

impl SendMode {
    /// The lowercase name used on the command line and in persisted state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Columns => "columns",
            Self::Rows => "rows",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "columns" | "column" => Ok(Self::Columns),
            "rows" | "row" => Ok(Self::Rows),
            other => Err(format!("unknown send mode `{other}` (expected `columns` or `rows`)")),
        }
    }
}
