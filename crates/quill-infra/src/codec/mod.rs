//! Spreadsheet and CSV translation for post import/export.

mod spreadsheet;

pub use spreadsheet::SpreadsheetCodec;
