//! Multi-format text extraction.
//!
//! [`extract`] turns raw file bytes into [`ExtractedText`]: dispatch by
//! [`FormatTag`], format-specific raw extraction, [`sanitize`], then the
//! minimum-content gate. Downstream chunking never sees text below the gate.
//!
//! | Format | Strategy |
//! |--------|----------|
//! | `txt`, `csv` | Lossy UTF-8 decode |
//! | `docx` | Shallow `<w:t>` scan of `word/document.xml` (or the raw buffer) |
//! | `pdf` | Per-page content model, then byte-scanning fallbacks |

mod docx;
mod pdf;
mod text;

use crate::error::ExtractionError;
use crate::models::{ExtractedText, FormatTag, RawDocument};
use crate::sanitize::{letter_count, sanitize};

/// Minimum characters of sanitized output for any format.
pub const MIN_CONTENT_CHARS: usize = 50;
/// Minimum alphabetic characters of sanitized PDF output.
pub const MIN_PDF_LETTERS: usize = 50;

/// Extract sanitized text from `bytes` declared as `format`.
///
/// # Errors
///
/// [`ExtractionError::InsufficientContent`] when fewer than
/// [`MIN_CONTENT_CHARS`] characters survive sanitizing, or, for PDF, fewer
/// than [`MIN_PDF_LETTERS`] alphabetic characters.
pub fn extract(bytes: &[u8], format: FormatTag) -> Result<ExtractedText, ExtractionError> {
    let raw = match format {
        FormatTag::Txt | FormatTag::Csv => text::decode(bytes),
        FormatTag::Docx => docx::extract_runs(bytes),
        FormatTag::Pdf => pdf::extract_pages(bytes),
    };

    let cleaned = sanitize(&raw);
    let chars = cleaned.chars().count();
    let letters = letter_count(&cleaned);

    let too_short = chars < MIN_CONTENT_CHARS;
    let too_few_letters = format == FormatTag::Pdf && letters < MIN_PDF_LETTERS;
    if too_short || too_few_letters {
        tracing::debug!(%format, chars, letters, "extraction below content floor");
        return Err(ExtractionError::InsufficientContent {
            format,
            chars,
            letters,
        });
    }

    Ok(ExtractedText::new(cleaned))
}

/// Convenience wrapper over [`extract`] for a [`RawDocument`].
pub fn extract_document(doc: &RawDocument) -> Result<ExtractedText, ExtractionError> {
    extract(&doc.bytes, doc.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_clean(text: &str) {
        assert!(!text.chars().any(crate::sanitize::is_stripped_control));
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn txt_extracts_and_sanitizes() {
        let input = "Quarterly report\u{0}\r\n\r\n\r\n\r\nRevenue grew   strongly across every region this year.";
        let out = extract(input.as_bytes(), FormatTag::Txt).unwrap();
        assert_clean(out.as_str());
        assert_eq!(
            out.as_str(),
            "Quarterly report\n\nRevenue grew strongly across every region this year."
        );
    }

    #[test]
    fn csv_is_decoded_as_text() {
        let csv = "name,role,city\nAda Lovelace,engineer,London\nGrace Hopper,admiral,Arlington\n";
        let out = extract(csv.as_bytes(), FormatTag::Csv).unwrap();
        assert!(out.as_str().contains("Grace Hopper,admiral,Arlington"));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let mut bytes = b"Valid prefix text that is long enough to pass the gate ".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, 0xfd]);
        bytes.extend_from_slice(b" and a valid suffix.");
        let out = extract(&bytes, FormatTag::Txt).unwrap();
        assert!(out.as_str().contains('\u{fffd}'));
        assert!(out.as_str().ends_with("valid suffix."));
    }

    #[test]
    fn short_text_is_insufficient() {
        let err = extract(b"too short", FormatTag::Txt).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::InsufficientContent { chars: 9, .. }
        ));
    }

    #[test]
    fn whitespace_padding_does_not_pass_gate() {
        let padded = format!("{}tiny{}", " \n".repeat(100), "\t".repeat(100));
        assert!(extract(padded.as_bytes(), FormatTag::Txt).is_err());
    }

    #[test]
    fn digits_pass_text_gate_but_not_pdf_gate() {
        let digits = "1234567890 ".repeat(10);
        assert!(extract(digits.as_bytes(), FormatTag::Csv).is_ok());
        assert!(extract(digits.as_bytes(), FormatTag::Pdf).is_err());
    }

    #[test]
    fn garbage_pdf_is_insufficient() {
        let err = extract(b"%PDF-1.4 nothing useful", FormatTag::Pdf).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::InsufficientContent {
                format: FormatTag::Pdf,
                ..
            }
        ));
    }

    #[test]
    fn extract_document_uses_declared_format() {
        let doc = RawDocument::new(
            "notes.txt",
            FormatTag::Txt,
            "Plain notes with plenty of characters to clear the content floor."
                .as_bytes()
                .to_vec(),
        );
        assert!(extract_document(&doc).is_ok());
    }
}
