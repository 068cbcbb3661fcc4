//! Shallow DOCX text extraction.
//!
//! Collects the text of every `<w:t>` / `<w:t attr="…">` element and joins the
//! runs with single spaces. This is a structural scan, not an XML parse:
//! unusual document internals may yield nothing, which the content gate then
//! rejects.
//!
//! A DOCX file is a ZIP archive with deflated XML entries, so the scan runs
//! over `word/document.xml` when the buffer opens as an archive. Otherwise the
//! buffer itself is scanned as lossily decoded text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;

const DOCUMENT_ENTRY: &str = "word/document.xml";
/// Maximum decompressed bytes read from the document entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

// `<w:t>` or `<w:t …attributes…>`; `<w:tab/>`, `<w:tbl>` and `<w:t/>` do not match.
static TEXT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").unwrap());

pub(super) fn extract_runs(bytes: &[u8]) -> String {
    let xml = match read_document_xml(bytes) {
        Some(xml) => xml,
        None => String::from_utf8_lossy(bytes).into_owned(),
    };
    scan_text_runs(&xml)
}

fn read_document_xml(bytes: &[u8]) -> Option<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).ok()?;
    let entry = match archive.by_name(DOCUMENT_ENTRY) {
        Ok(entry) => entry,
        Err(e) => {
            tracing::debug!("docx archive has no {}: {}", DOCUMENT_ENTRY, e);
            return None;
        }
    };
    let mut out = Vec::new();
    if let Err(e) = entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut out) {
        tracing::warn!("failed to read {}: {}", DOCUMENT_ENTRY, e);
        return None;
    }
    Some(String::from_utf8_lossy(&out).into_owned())
}

fn scan_text_runs(xml: &str) -> String {
    TEXT_RUN
        .captures_iter(xml)
        .filter_map(|cap| cap.get(1))
        .map(|m| unescape_entities(m.as_str()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn unescape_entities(raw: &str) -> String {
    match quick_xml::escape::unescape(raw) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}
