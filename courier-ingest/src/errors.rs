use std::fmt;
use std::str::Utf8Error;

/// Errors produced while turning an uploaded payload into a [`crate::Table`].
///
/// Every variant aborts the job before any message is sent.
#[derive(Debug)]
pub enum IngestError {
    /// The filename has no extension, or one we do not read.
    UnsupportedExtension {
        /// The offending extension, lower-cased (empty if there was none).
        extension: String,
    },
    /// A line-delimited text payload was not valid UTF-8.
    Encoding(Utf8Error),
    /// The CSV reader rejected the payload.
    Csv(csv::Error),
    /// The spreadsheet could not be opened or its first sheet read.
    Spreadsheet(calamine::XlsxError),
    /// The workbook contains no worksheet.
    EmptyWorkbook,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedExtension { extension } if extension.is_empty() => {
                write!(f, "unsupported file type: missing extension")
            }
            Self::UnsupportedExtension { extension } => {
                write!(f, "unsupported file type: .{extension}")
            }
            Self::Encoding(e) => write!(f, "text file is not valid UTF-8: {e}"),
            Self::Csv(e) => write!(f, "invalid CSV: {e}"),
            Self::Spreadsheet(e) => write!(f, "invalid spreadsheet: {e}"),
            Self::EmptyWorkbook => write!(f, "spreadsheet has no worksheet"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encoding(e) => Some(e),
            Self::Csv(e) => Some(e),
            Self::Spreadsheet(e) => Some(e),
            _ => None,
        }
    }
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self { Self::Csv(e) }
}

impl From<calamine::XlsxError> for IngestError {
    fn from(e: calamine::XlsxError) -> Self { Self::Spreadsheet(e) }
}

impl From<Utf8Error> for IngestError {
    fn from(e: Utf8Error) -> Self { Self::Encoding(e) }
}
