//! # docqa core
//!
//! Pure, synchronous building blocks for document question answering:
//!
//! ```text
//! raw bytes ──▶ extract ──▶ ExtractedText ──▶ Chunker ──▶ Vec<Chunk>
//!                                                          │ (stored by caller)
//!                                   query ──▶ select ◀─────┘
//!                                               │
//!                                               ▼
//!                                         ContextBundle ──▶ LLM prompt
//! ```
//!
//! Nothing in this crate performs I/O or spawns tasks. Callers are free to run
//! extraction and chunking for independent documents in parallel.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Format tags, chunks, source references, context bundles |
//! | [`sanitize`] | Control-character stripping and whitespace normalization |
//! | [`extract`] | Per-format text extraction with a minimum-content gate |
//! | [`chunk`] | Overlapping, boundary-aware windowing |
//! | [`select`] | Summary / keyword relevance selection and context assembly |
//! | [`error`] | Error types |

pub mod chunk;
pub mod error;
pub mod extract;
pub mod models;
pub mod sanitize;
pub mod select;

pub use chunk::Chunker;
pub use error::{ExtractionError, UnsupportedFormat};
pub use extract::{extract, extract_document};
pub use models::{Chunk, ContextBundle, ExtractedText, FormatTag, RawDocument, SourceRef};
pub use sanitize::sanitize;
pub use select::{select, QueryMode};
