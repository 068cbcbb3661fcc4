//! Core data models flowing through extraction, chunking and selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnsupportedFormat;
use crate::select::QueryMode;

/// Declared format of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Pdf,
    Docx,
    Csv,
    Txt,
}

impl FormatTag {
    pub const ALL: [FormatTag; 4] = [FormatTag::Pdf, FormatTag::Docx, FormatTag::Csv, FormatTag::Txt];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Pdf => "pdf",
            FormatTag::Docx => "docx",
            FormatTag::Csv => "csv",
            FormatTag::Txt => "txt",
        }
    }

    /// MIME type recorded alongside stored blobs.
    pub fn content_type(&self) -> &'static str {
        match self {
            FormatTag::Pdf => "application/pdf",
            FormatTag::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FormatTag::Csv => "text/csv",
            FormatTag::Txt => "text/plain",
        }
    }

    /// Resolve the tag from a filename's extension (case-insensitive).
    pub fn from_filename(name: &str) -> Result<Self, UnsupportedFormat> {
        match name.rsplit_once('.') {
            Some((_, ext)) => ext.parse(),
            None => Err(UnsupportedFormat(name.to_string())),
        }
    }
}

impl FromStr for FormatTag {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(FormatTag::Pdf),
            "docx" => Ok(FormatTag::Docx),
            "csv" => Ok(FormatTag::Csv),
            "txt" | "text" => Ok(FormatTag::Txt),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded file as handed to the extractor. Consumed once.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub name: String,
    pub format: FormatTag,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, format: FormatTag, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            format,
            bytes,
        }
    }
}

/// Sanitized text produced by the extractor.
///
/// Only constructed through [`crate::extract::extract`], so it always
/// satisfies the sanitize invariants and the minimum-content gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl AsRef<str> for ExtractedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An independently retrievable segment of one document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub content: String,
    pub index: usize,
    pub source_label: String,
}

/// A chunk with its keyword relevance score. Only lives during selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: u32,
}

/// Citation shown to the client next to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub document_name: String,
    pub chunk_index: usize,
    /// First 200 characters of the chunk.
    pub content: String,
}

/// Context handed to the LLM for one chat turn. Built fresh every turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextBundle {
    pub mode: QueryMode,
    pub chunks: Vec<Chunk>,
    pub context: String,
    pub sources: Vec<SourceRef>,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
