use docqa_core::select::{NO_CONTENT_PLACEHOLDER, SUMMARY_SELECTION};
use docqa_core::{extract, select, Chunk, Chunker, ExtractionError, FormatTag, QueryMode};
use std::io::Write;

const PDF_PHRASE: &str =
    "Annual maintenance covers every pump station in the northern district network";

/// Single-page PDF whose content stream shows `phrase` in Helvetica.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    minimal_pdf_with_pages(&[phrase])
}

/// PDF with one page per entry, each page showing its text in Helvetica.
///
/// Objects: 1 catalog, 2 page tree, 3 font, then a page and its content
/// stream for every entry.
fn minimal_pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + i * 2).collect();
    let kids = page_ids
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = Vec::new();
    let mut offsets = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids,
            pages.len()
        )
        .as_bytes(),
    );
    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    for (text, page_id) in pages.iter().zip(&page_ids) {
        let content_id = page_id + 1;
        let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_id, content_id
            )
            .as_bytes(),
        );
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id,
                content.len(),
                content
            )
            .as_bytes(),
        );
    }

    let size = offsets.len() + 1;
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(format!("trailer << /Size {} /Root 1 0 R >>\nstartxref\n", size).as_bytes());
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn minimal_docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
        .collect();
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn assert_clean(text: &str) {
    assert!(
        !text
            .chars()
            .any(docqa_core::sanitize::is_stripped_control),
        "control characters survived: {:?}",
        text
    );
    assert!(!text.contains("\n\n\n"), "newline run survived: {:?}", text);
}

#[test]
fn pdf_fixture_extracts_phrase() {
    let bytes = minimal_pdf_with_phrase(PDF_PHRASE);
    let text = extract(&bytes, FormatTag::Pdf).unwrap();
    assert_clean(text.as_str());
    assert!(text.as_str().contains("maintenance"), "got {:?}", text.as_str());
    assert!(text.as_str().contains("district"), "got {:?}", text.as_str());
}

#[test]
fn pdf_pages_are_separated_by_a_blank_line() {
    let bytes = minimal_pdf_with_pages(&[
        "First page of the inspection report ends with the word alphaomega",
        "secondpage begins here with the pump station findings",
    ]);
    let text = extract(&bytes, FormatTag::Pdf).unwrap();
    assert!(
        text.as_str().contains("alphaomega\n\nsecondpage"),
        "got {:?}",
        text.as_str()
    );
    assert!(!text.as_str().contains("alphaomegasecondpage"));
}

#[test]
fn short_pdf_fixture_is_insufficient() {
    let bytes = minimal_pdf_with_phrase("tiny");
    let err = extract(&bytes, FormatTag::Pdf).unwrap_err();
    assert!(matches!(
        err,
        ExtractionError::InsufficientContent {
            format: FormatTag::Pdf,
            ..
        }
    ));
}

#[test]
fn docx_fixture_extracts_runs() {
    let bytes = minimal_docx_with_paragraphs(&[
        "Lease agreement for the riverside warehouse.",
        "The tenant pays rent monthly &amp; on time.",
    ]);
    let text = extract(&bytes, FormatTag::Docx).unwrap();
    assert_clean(text.as_str());
    assert_eq!(
        text.as_str(),
        "Lease agreement for the riverside warehouse. The tenant pays rent monthly & on time."
    );
}

#[test]
fn csv_and_txt_extract_cleanly() {
    let csv = "id,item,amount\r\n1,pumps,1200\r\n2,valves,300\r\n3,pipes,4500\r\n\r\n\r\n\r\n";
    let text = extract(csv.as_bytes(), FormatTag::Csv).unwrap();
    assert_clean(text.as_str());
    assert!(text.as_str().starts_with("id,item,amount\n1,pumps,1200"));

    let txt = "Minutes\u{7}\u{1b} of the\t\tboard meeting held on Monday, with all members present.";
    let text = extract(txt.as_bytes(), FormatTag::Txt).unwrap();
    assert_clean(text.as_str());
    assert_eq!(
        text.as_str(),
        "Minutes of the board meeting held on Monday, with all members present."
    );
}

#[test]
fn every_format_rejects_short_input() {
    for format in FormatTag::ALL {
        let err = extract(b"hello", format).unwrap_err();
        assert!(matches!(err, ExtractionError::InsufficientContent { .. }));
    }
}

#[test]
fn extracted_text_chunks_at_sentence_boundaries() {
    let input = format!("A.{}", "filler content here. ".repeat(60));
    let text = extract(input.as_bytes(), FormatTag::Txt).unwrap();
    let chunks = Chunker::default().chunk(text.as_str(), "filler.txt");

    assert_eq!(chunks.len(), 2);
    let chars: Vec<char> = text.as_str().chars().collect();
    let tail: String = chars[800..].iter().collect();
    assert_eq!(chunks[1].content, tail.trim());
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i);
        assert_eq!(chunk.source_label, "filler.txt");
        assert!(chunk.content.ends_with('.'));
        assert!(chunk.content.chars().count() > 50);
        assert!(chunk.content.chars().count() <= 1000);
        assert_eq!(docqa_core::sanitize(&chunk.content), chunk.content);
    }
}

#[test]
fn penalty_question_ranks_matching_chunk_first() {
    let mut pool: Vec<Chunk> = Chunker::default().chunk(
        &"General terms apply to both parties of this agreement. ".repeat(10),
        "contract.pdf",
    );
    pool.extend(Chunker::default().chunk(
        "Late delivery incurs a penalty of one percent per day. The penalty is capped by this clause.",
        "annex.pdf",
    ));

    let bundle = select("What is the penalty clause", &pool);
    assert_eq!(bundle.mode, QueryMode::Keyword);
    assert_eq!(bundle.chunks[0].source_label, "annex.pdf");
    assert!(bundle.context.starts_with("[From: annex.pdf]\n"));
    assert_eq!(bundle.sources[0].document_name, "annex.pdf");
}

#[test]
fn summary_question_takes_leading_chunks() {
    let text = (0..40)
        .map(|i| format!("Section {} describes an independent part of the handbook.", i))
        .collect::<Vec<_>>()
        .join("\n\n");
    let pool = Chunker::new(120, 20).chunk(&text, "handbook.txt");
    assert!(pool.len() > SUMMARY_SELECTION);

    let bundle = select("Summarize this document", &pool);
    assert_eq!(bundle.mode, QueryMode::Summary);
    assert_eq!(bundle.chunks, pool[..SUMMARY_SELECTION].to_vec());
    assert_eq!(bundle.sources.len(), 5);
}

#[test]
fn nothing_ingested_yields_placeholder() {
    let bundle = select("What is the penalty clause", &[]);
    assert_eq!(bundle.context, NO_CONTENT_PLACEHOLDER);
    assert!(bundle.sources.is_empty());
}

#[test]
fn bundle_serializes_for_clients() {
    let pool = Chunker::default().chunk(&"Warehouse inventory levels are reviewed weekly. ".repeat(4), "stock.csv");
    let bundle = select("inventory levels", &pool);
    let json = serde_json::to_value(&bundle).unwrap();
    assert_eq!(json["mode"], "keyword");
    assert_eq!(json["sources"][0]["documentName"], "stock.csv");
    assert_eq!(json["sources"][0]["chunkIndex"], 0);
}
