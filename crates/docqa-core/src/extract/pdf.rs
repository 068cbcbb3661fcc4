//! PDF text extraction with a structured pass and byte-scanning fallbacks.
//!
//! The structured pass walks the page tree through `pdf-extract` and joins
//! page texts with a blank line. Malformed fonts can make that parser panic or
//! return nothing, so when it yields fewer than [`MIN_PDF_LETTERS`] letters
//! the heuristics below run in order and the first to reach the floor wins:
//!
//! 1. **Text-show operators**: parenthesised strings shown by `Tj`, `'`, `"`
//!    and `TJ` arrays, read from every `stream … endstream` body (inflated
//!    when zlib-compressed) or from the whole file when it has no streams.
//!    Each stream's text is separated from the next by a blank line.
//! 2. **Stream text**: printable runs of stream bodies that are mostly text.
//! 3. **Printable runs**: runs of 4+ printable ASCII bytes with a letter,
//!    anywhere in the file.
//!
//! Fallback output is best-effort and may be partial or garbled.

use flate2::read::ZlibDecoder;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};

use super::MIN_PDF_LETTERS;
use crate::sanitize::letter_count;

/// Maximum inflated bytes per stream.
const MAX_STREAM_BYTES: u64 = 16 * 1024 * 1024;
/// Share of printable bytes for a stream body to count as text.
const TEXT_STREAM_RATIO: f64 = 0.85;
/// TJ kerning at or below this value (thousandths of an em) reads as a space.
const TJ_WORD_GAP: f32 = -200.0;

static STREAM_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s-u)stream\r?\n(.*?)endstream").unwrap());
static TEXT_SHOW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s-u)\(((?:[^()\\]|\\.)*)\)\s*(?:Tj|'|")|\[((?:[^\[\]\\]|\\.)*)\]\s*TJ"#)
        .unwrap()
});
static TJ_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s-u)\(((?:[^()\\]|\\.)*)\)|(-?[0-9]*\.?[0-9]+)").unwrap());
static PRINTABLE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)[\x20-\x7e]{4,}").unwrap());

pub(super) fn extract_pages(bytes: &[u8]) -> String {
    let structured = structured_text(bytes).unwrap_or_default();
    let structured_letters = letter_count(&structured);
    if structured_letters >= MIN_PDF_LETTERS {
        return structured;
    }

    tracing::debug!(
        letters = structured_letters,
        "structured PDF pass insufficient, scanning bytes"
    );
    let fallback = fallback_text(bytes);
    if structured_letters > 0 && structured_letters >= letter_count(&fallback) {
        structured
    } else {
        fallback
    }
}

/// Per-page text via the PDF content model, pages separated by a blank line.
fn structured_text(bytes: &[u8]) -> Option<String> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));
    match result {
        Ok(Ok(pages)) => Some(
            pages
                .iter()
                .map(|page| page.trim())
                .filter(|page| !page.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n"),
        ),
        Ok(Err(e)) => {
            tracing::debug!("pdf-extract failed: {}", e);
            None
        }
        Err(_) => {
            tracing::warn!("pdf-extract panicked, using fallback extraction");
            None
        }
    }
}

fn fallback_text(bytes: &[u8]) -> String {
    let streams = stream_bodies(bytes);

    let text_show = || text_show_strings(&streams, bytes);
    let in_streams = || stream_text(&streams);
    let anywhere = || printable_runs(bytes);
    let strategies: [&dyn Fn() -> String; 3] = [&text_show, &in_streams, &anywhere];

    let mut best = String::new();
    for strategy in strategies {
        let text = strategy();
        let letters = letter_count(&text);
        if letters >= MIN_PDF_LETTERS {
            return text;
        }
        if letters > letter_count(&best) {
            best = text;
        }
    }
    best
}

/// Bodies of all `stream … endstream` sections, inflated when possible.
fn stream_bodies(bytes: &[u8]) -> Vec<Vec<u8>> {
    STREAM_BODY
        .captures_iter(bytes)
        .filter_map(|cap| cap.get(1))
        .map(|m| inflate(m.as_bytes()).unwrap_or_else(|| trim_eol(m.as_bytes()).to_vec()))
        .collect()
}

/// Drop the single end-of-line marker that precedes `endstream`.
fn trim_eol(body: &[u8]) -> &[u8] {
    body.strip_suffix(b"\r\n")
        .or_else(|| body.strip_suffix(b"\n"))
        .or_else(|| body.strip_suffix(b"\r"))
        .unwrap_or(body)
}

/// Zlib-inflate a stream body; trailing bytes after the zlib stream are ignored.
fn inflate(raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(raw)
        .take(MAX_STREAM_BYTES)
        .read_to_end(&mut out)
        .ok()?;
    Some(out)
}

fn text_show_strings(streams: &[Vec<u8>], whole: &[u8]) -> String {
    let sources: Vec<&[u8]> = if streams.is_empty() {
        vec![whole]
    } else {
        streams.iter().map(Vec::as_slice).collect()
    };
    sources
        .into_iter()
        .map(|content| {
            let mut pieces = Vec::new();
            collect_text_show(content, &mut pieces);
            pieces.join(" ")
        })
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn collect_text_show(content: &[u8], pieces: &mut Vec<String>) {
    for cap in TEXT_SHOW.captures_iter(content) {
        let text = if let Some(single) = cap.get(1) {
            decode_pdf_string(single.as_bytes())
        } else if let Some(array) = cap.get(2) {
            decode_tj_array(array.as_bytes())
        } else {
            continue;
        };
        if !text.trim().is_empty() {
            pieces.push(text);
        }
    }
}

fn decode_tj_array(items: &[u8]) -> String {
    let mut out = String::new();
    for cap in TJ_ITEM.captures_iter(items) {
        if let Some(s) = cap.get(1) {
            out.push_str(&decode_pdf_string(s.as_bytes()));
        } else if let Some(n) = cap.get(2) {
            let kerning = std::str::from_utf8(n.as_bytes())
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.0);
            if kerning <= TJ_WORD_GAP && !out.ends_with(' ') {
                out.push(' ');
            }
        }
    }
    out
}

/// Decode the body of a PDF literal string (without the outer parentheses).
fn decode_pdf_string(raw: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' || i + 1 >= raw.len() {
            bytes.push(b);
            i += 1;
            continue;
        }
        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'b' | b'f' => {}
            b'(' | b')' | b'\\' => bytes.push(next),
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                    value = value * 8 + u32::from(raw[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                bytes.push((value & 0xff) as u8);
            }
            other => bytes.push(other),
        }
    }

    if let Some(utf16) = bytes.strip_prefix(&[0xfe, 0xff]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    // PDFDocEncoding agrees with Latin-1 for printable text.
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn stream_text(streams: &[Vec<u8>]) -> String {
    streams
        .iter()
        .filter(|body| !body.is_empty() && printable_ratio(body) >= TEXT_STREAM_RATIO)
        .map(|body| printable_runs(body))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn printable_ratio(body: &[u8]) -> f64 {
    let printable = body
        .iter()
        .filter(|b| matches!(b, 0x20..=0x7e | b'\n' | b'\r' | b'\t'))
        .count();
    printable as f64 / body.len() as f64
}

/// Runs of 4+ printable ASCII bytes that contain at least one letter.
fn printable_runs(bytes: &[u8]) -> String {
    PRINTABLE_RUN
        .find_iter(bytes)
        .map(|m| m.as_bytes())
        .filter(|run| run.iter().any(u8::is_ascii_alphabetic))
        .map(|run| String::from_utf8_lossy(run).trim().to_string())
        .filter(|run| !run.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    const PHRASE: &str = "The quarterly maintenance schedule covers every pump station in the district";

    #[test]
    fn decodes_escapes() {
        assert_eq!(decode_pdf_string(br"a\(b\)c\\d"), "a(b)c\\d");
        assert_eq!(decode_pdf_string(br"tab\there"), "tab\there");
        assert_eq!(decode_pdf_string(br"\101\102C"), "ABC");
        assert_eq!(decode_pdf_string(b"line\\\ncontinued"), "linecontinued");
    }

    #[test]
    fn decodes_utf16_strings() {
        let raw = [0xfe, 0xff, 0x00, b'H', 0x00, b'i'];
        assert_eq!(decode_pdf_string(&raw), "Hi");
    }

    #[test]
    fn collects_tj_and_quote_operators() {
        let content = b"BT /F1 12 Tf (Hello) Tj 0 -14 Td (second line) ' 1 2 (third) \" ET";
        let mut pieces = Vec::new();
        collect_text_show(content, &mut pieces);
        assert_eq!(pieces, vec!["Hello", "second line", "third"]);
    }

    #[test]
    fn tj_arrays_respect_word_gaps() {
        let content = b"BT [(Kern)-20(ed) -250(words)] TJ ET";
        let mut pieces = Vec::new();
        collect_text_show(content, &mut pieces);
        assert_eq!(pieces, vec!["Kerned words"]);
    }

    #[test]
    fn inflates_compressed_streams() {
        let content = format!("BT ({}) Tj ET", PHRASE);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut pdf = b"%PDF-1.4\n4 0 obj << /Filter /FlateDecode >> stream\n".to_vec();
        pdf.extend_from_slice(&compressed);
        pdf.extend_from_slice(b"\nendstream endobj\n%%EOF\n");

        let text = fallback_text(&pdf);
        assert_eq!(text, PHRASE);
    }

    #[test]
    fn separates_streams_with_blank_line() {
        let pdf = b"%PDF-1.4\n4 0 obj << >> stream\nBT (First page ends with alphaomega) Tj ET\nendstream endobj\n5 0 obj << >> stream\nBT (secondpage starts here) Tj ET\nendstream endobj\n%%EOF\n";
        let text = text_show_strings(&stream_bodies(pdf), pdf);
        assert_eq!(
            text,
            "First page ends with alphaomega\n\nsecondpage starts here"
        );
    }

    #[test]
    fn falls_back_to_printable_runs() {
        let mut bytes = vec![0u8, 1, 2, 255];
        bytes.extend_from_slice(b"Readable words survive in otherwise binary garbage data here");
        bytes.extend_from_slice(&[0, 159, 200, 3]);
        bytes.extend_from_slice(b"1234 5678");
        let text = printable_runs(&bytes);
        assert_eq!(
            text,
            "Readable words survive in otherwise binary garbage data here"
        );
    }

    #[test]
    fn garbage_yields_little_text() {
        assert!(letter_count(&extract_pages(&[0u8, 1, 2, 3, 254, 255])) < MIN_PDF_LETTERS);
    }
}
