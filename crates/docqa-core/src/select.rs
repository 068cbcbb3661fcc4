//! Relevance selection: choose which chunks become LLM context for a query.
//!
//! Two heuristics, picked by inspecting the query:
//!
//! - **Summary mode**: the query mentions summarizing or an overview. The
//!   first [`SUMMARY_SELECTION`] chunks are taken in pool order; nothing is
//!   scored.
//! - **Keyword mode**: every other query. Whitespace tokens longer than
//!   three characters become keywords; a chunk scores the total number of
//!   non-overlapping keyword occurrences in its lower-cased content. Chunks
//!   are stably sorted by score (ties keep pool order) and the top
//!   [`KEYWORD_SELECTION`] are taken.
//!
//! The candidate pool is fetched by the caller, in document/index order,
//! capped at [`QueryMode::candidate_limit`]. Selection never reorders the
//! pool beyond the stable score sort and never fails.

use serde::Serialize;

use crate::models::{Chunk, ContextBundle, ScoredChunk, SourceRef};

/// Lower-cased substrings that switch a query into summary mode.
pub const SUMMARY_TRIGGERS: [&str; 4] = ["summar", "overview", "what is this", "tell me about"];

/// Chunks taken in summary mode.
pub const SUMMARY_SELECTION: usize = 15;
/// Chunks taken in keyword mode.
pub const KEYWORD_SELECTION: usize = 10;
/// Candidate pool cap for summary mode.
pub const SUMMARY_POOL: usize = 50;
/// Candidate pool cap for keyword mode.
pub const KEYWORD_POOL: usize = 100;
/// Citations emitted per answer.
pub const MAX_SOURCES: usize = 5;
/// Characters of chunk content carried in a citation.
pub const SOURCE_EXCERPT_CHARS: usize = 200;

/// Context sent when nothing was selected.
pub const NO_CONTENT_PLACEHOLDER: &str = "No relevant content found in the documents.";
/// Separator between rendered chunks in the context string.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// How a query is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Summary,
    Keyword,
}

impl QueryMode {
    /// Summary when the lower-cased query contains any [`SUMMARY_TRIGGERS`].
    pub fn detect(query: &str) -> Self {
        let lowered = query.to_lowercase();
        if SUMMARY_TRIGGERS.iter().any(|t| lowered.contains(t)) {
            QueryMode::Summary
        } else {
            QueryMode::Keyword
        }
    }

    /// Size of the candidate pool the caller fetches.
    pub fn candidate_limit(&self) -> usize {
        match self {
            QueryMode::Summary => SUMMARY_POOL,
            QueryMode::Keyword => KEYWORD_POOL,
        }
    }

    /// Number of chunks kept after selection.
    pub fn selection_limit(&self) -> usize {
        match self {
            QueryMode::Summary => SUMMARY_SELECTION,
            QueryMode::Keyword => KEYWORD_SELECTION,
        }
    }
}

/// Keywords of a query: lower-cased whitespace tokens longer than 3 chars.
pub fn keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

/// Sum of non-overlapping occurrences of each keyword in `content`.
pub fn keyword_score(content: &str, keywords: &[String]) -> u32 {
    let lowered = content.to_lowercase();
    keywords
        .iter()
        .map(|k| lowered.matches(k.as_str()).count() as u32)
        .sum()
}

/// Score every chunk of the pool, keeping pool order.
pub fn score_chunks(pool: &[Chunk], keywords: &[String]) -> Vec<ScoredChunk> {
    pool.iter()
        .map(|chunk| ScoredChunk {
            score: keyword_score(&chunk.content, keywords),
            chunk: chunk.clone(),
        })
        .collect()
}

/// Select context chunks for `query` out of `pool`.
pub fn select(query: &str, pool: &[Chunk]) -> ContextBundle {
    let mode = QueryMode::detect(query);

    let chunks: Vec<Chunk> = match mode {
        QueryMode::Summary => pool.iter().take(mode.selection_limit()).cloned().collect(),
        QueryMode::Keyword => {
            let keywords = keywords(query);
            let mut scored = score_chunks(pool, &keywords);
            // sort_by is stable: equal scores keep pool order.
            scored.sort_by(|a, b| b.score.cmp(&a.score));
            scored
                .into_iter()
                .take(mode.selection_limit())
                .map(|s| s.chunk)
                .collect()
        }
    };

    ContextBundle {
        mode,
        context: render_context(&chunks),
        sources: source_refs(&chunks),
        chunks,
    }
}

/// Render chunks as `[From: label]\ncontent` blocks joined by [`CONTEXT_SEPARATOR`].
pub fn render_context(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTENT_PLACEHOLDER.to_string();
    }
    chunks
        .iter()
        .map(|c| format!("[From: {}]\n{}", c.source_label, c.content))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Citations for the first [`MAX_SOURCES`] selected chunks.
pub fn source_refs(chunks: &[Chunk]) -> Vec<SourceRef> {
    chunks
        .iter()
        .take(MAX_SOURCES)
        .map(|c| SourceRef {
            document_name: c.source_label.clone(),
            chunk_index: c.index,
            content: c.content.chars().take(SOURCE_EXCERPT_CHARS).collect(),
        })
        .collect()
}
