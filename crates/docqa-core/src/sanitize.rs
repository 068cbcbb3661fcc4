//! Text normalization applied to everything the extractor and chunker emit.
//!
//! # Rules
//!
//! 1. `\r\n` and lone `\r` become `\n`.
//! 2. Control characters `0x00–0x08`, `0x0B`, `0x0C`, `0x0E–0x1F` and `0x7F`
//!    are removed. Tab and newline survive this step.
//! 3. Runs of non-newline whitespace (spaces, tabs, NBSP, em spaces, NEL
//!    and other Unicode whitespace) collapse to a single space.
//! 4. Spaces touching a newline are dropped.
//! 5. Three or more consecutive newlines collapse to two.
//! 6. Leading and trailing whitespace is trimmed.
//!
//! The transform is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());
static SPACE_AROUND_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r" ?\n ?").unwrap());
static NEWLINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Whether `c` is one of the control characters stripped by [`sanitize`].
pub fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{7f}')
}

/// Normalize `text` according to the module rules.
pub fn sanitize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let stripped: String = unified.chars().filter(|c| !is_stripped_control(*c)).collect();
    let collapsed = HORIZONTAL_WS.replace_all(&stripped, " ");
    let tight = SPACE_AROUND_NEWLINE.replace_all(&collapsed, "\n");
    let paragraphs = NEWLINE_RUN.replace_all(&tight, "\n\n");
    paragraphs.trim().to_string()
}

/// Count of alphabetic characters, used by the extraction content gate.
pub fn letter_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}
