//! Error types for the core pipeline.
//!
//! Only extraction can fail. Chunking and selection accept any input,
//! including empty text, empty pools and empty queries.

use crate::models::FormatTag;

/// Extraction produced too little usable text to be worth chunking.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// Fewer than the minimum characters (or, for PDF, letters) survived sanitizing.
    #[error(
        "not enough extractable text in {format} document ({chars} characters, {letters} letters)"
    )]
    InsufficientContent {
        format: FormatTag,
        chars: usize,
        letters: usize,
    },
}

/// A format tag or filename extension outside `pdf|docx|csv|txt`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported format: {0:?} (expected pdf, docx, csv or txt)")]
pub struct UnsupportedFormat(pub String);
