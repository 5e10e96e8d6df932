//! Error types for transpdf library.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for transpdf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF translation.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted and requires a password.
    #[error("Document is encrypted")]
    Encrypted,

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Malformed page or a precondition violated by the caller.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The memory pre-check failed even at the smallest batch size.
    #[error("Insufficient memory: ~{required_mb:.0}MB required, {available_mb:.0}MB usable")]
    ResourceExhausted { required_mb: f64, available_mb: f64 },

    /// No font face could be embedded for the text.
    #[error("Font embedding failed: {0}")]
    FontEmbeddingFailed(String),

    /// A font has no glyph for a character.
    #[error("Font {font} has no glyph for {ch:?}")]
    MissingGlyph { font: String, ch: char },

    /// Removal or insertion into a malformed content stream.
    #[error("Content stream corrupt: {0}")]
    ContentStreamCorrupt(String),

    /// The external layout model reported an error.
    #[error("Layout model error: {0}")]
    LayoutModel(String),

    /// The translation provider returned a different number of strings.
    #[error("Translation count mismatch: expected {expected}, got {actual}")]
    TranslationCountMismatch { expected: usize, actual: usize },

    /// The translation provider failed.
    #[error("Translation error: {0}")]
    Translation(String),

    /// None of the selected pages carries an embedded text layer.
    #[error("No embedded text layer in the selected pages (scanned document?)")]
    NoTextLayer,

    /// Illegal page state transition.
    #[error("Invalid page state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Processing was cancelled.
    #[error("Cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// Failure categories recorded for failed pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    InvalidInput,
    ResourceExhausted,
    FontEmbedding,
    ContentStream,
    LayoutModel,
    Translation,
    Cancelled,
    Other,
}

impl Error {
    /// Category of this error when it fails a single page.
    pub fn category(&self) -> FailureCategory {
        match self {
            Error::InvalidInput(_) | Error::PageOutOfRange(..) | Error::NoTextLayer => {
                FailureCategory::InvalidInput
            }
            Error::ResourceExhausted { .. } => FailureCategory::ResourceExhausted,
            Error::FontEmbeddingFailed(_) | Error::MissingGlyph { .. } => {
                FailureCategory::FontEmbedding
            }
            Error::ContentStreamCorrupt(_) | Error::PdfParse(_) => FailureCategory::ContentStream,
            Error::LayoutModel(_) => FailureCategory::LayoutModel,
            Error::Translation(_) | Error::TranslationCountMismatch { .. } => {
                FailureCategory::Translation
            }
            Error::Cancelled => FailureCategory::Cancelled,
            _ => FailureCategory::Other,
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        match err.into_kind() {
            csv::ErrorKind::Io(e) => Error::Io(e),
            other => Error::Other(format!("CSV error: {:?}", other)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(
            err.to_string(),
            "Page 10 is out of range (document has 5 pages)"
        );

        let err = Error::TranslationCountMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Translation count mismatch: expected 3, got 2"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_failure_category() {
        assert_eq!(
            Error::InvalidInput("zero height".into()).category(),
            FailureCategory::InvalidInput
        );
        assert_eq!(
            Error::ResourceExhausted {
                required_mb: 100.0,
                available_mb: 10.0
            }
            .category(),
            FailureCategory::ResourceExhausted
        );
        assert_eq!(
            Error::MissingGlyph {
                font: "F1".into(),
                ch: 'あ'
            }
            .category(),
            FailureCategory::FontEmbedding
        );
        assert_eq!(
            Error::ContentStreamCorrupt("bad".into()).category(),
            FailureCategory::ContentStream
        );
    }

    #[test]
    fn test_failure_category_serializes_snake_case() {
        let json = serde_json::to_string(&FailureCategory::ResourceExhausted).unwrap();
        assert_eq!(json, "\"resource_exhausted\"");
    }
}
