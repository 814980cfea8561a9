use std::fmt;

use crate::domain::{Post, PostRow};

/// Tabular file formats understood by a [`PostCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Csv,
}

impl SheetFormat {
    pub const XLSX_MIME: &'static str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

    /// Detect the format of an upload from its file name, falling back to its MIME type.
    pub fn detect(file_name: Option<&str>, mime: Option<&str>) -> Option<Self> {
        let by_extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .and_then(|(_, ext)| Self::from_extension(ext));

        by_extension.or_else(|| mime.and_then(Self::from_mime))
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_ascii_lowercase().as_str() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            Self::XLSX_MIME => Some(Self::Xlsx),
            "text/csv" | "application/csv" | "text/plain" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Xlsx => Self::XLSX_MIME,
            Self::Csv => "text/csv",
        }
    }
}

impl fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("Malformed {format} file: {reason}")]
    Malformed { format: SheetFormat, reason: String },

    #[error("Failed to write spreadsheet: {0}")]
    Write(String),
}

/// Translates between tabular files and posts.
pub trait PostCodec: Send + Sync {
    /// Read record candidates from a file whose header row names `title` and `body`.
    fn decode(&self, bytes: &[u8], format: SheetFormat) -> Result<Vec<PostRow>, CodecError>;

    /// Write posts, in the given order, below a `title`/`body` header.
    fn encode(&self, posts: &[Post]) -> Result<Vec<u8>, CodecError>;

    /// The format produced by [`PostCodec::encode`].
    fn export_format(&self) -> SheetFormat;
}
