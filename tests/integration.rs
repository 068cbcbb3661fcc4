use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docqa");
    path
}

const PDF_PHRASE: &str =
    "Quarterly maintenance schedule covers every pump station in the northern district";

/// Single-page PDF showing `phrase` in Helvetica.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn minimal_docx_with_text(text: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("contract.txt"),
        "Service agreement between the supplier and the city.\n\n\
         Late delivery incurs a penalty of one percent per day. The penalty \
         is capped at ten percent by this clause.",
    )
    .unwrap();
    fs::write(
        files_dir.join("inventory.csv"),
        "item,quantity,location\npumps,12,north depot\nvalves,340,south depot\npipes,900,central yard\n",
    )
    .unwrap();
    fs::write(
        files_dir.join("handbook.docx"),
        minimal_docx_with_text(
            "Employees must complete safety training before operating any pump station equipment.",
        ),
    )
    .unwrap();
    fs::write(files_dir.join("schedule.pdf"), minimal_pdf_with_phrase(PDF_PHRASE)).unwrap();
    fs::write(files_dir.join("diagram.png"), [0x89, b'P', b'N', b'G']).unwrap();

    // Unreachable LLM endpoint: `ask` must fail cleanly.
    let config_content = format!(
        r#"[db]
path = "{root}/data/docqa.sqlite"

[storage]
root = "{root}/data/blobs"

[chunking]
insert_batch_size = 2

[llm]
base_url = "http://127.0.0.1:9/v1"
api_key_env = "DOCQA_TEST_UNSET_KEY"
timeout_secs = 5

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn files_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("files")
}

/// Document ids printed by `ingest` as `  + <id> (<n> chunks)`.
fn ingested_ids(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|l| l.trim().strip_prefix("+ "))
        .filter_map(|l| l.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_docqa(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_docqa(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_directory_all_formats() {
    let (_tmp, config_path) = setup_test_env();
    let dir = files_dir(&config_path);

    run_docqa(&config_path, &["init"]);
    let (stdout, stderr, success) = run_docqa(&config_path, &["ingest", dir.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents ready: 4"), "stdout={}", stdout);
    assert!(stdout.contains("skipped (unsupported): 1"), "stdout={}", stdout);
    assert!(stdout.contains("ok"));
    assert_eq!(ingested_ids(&stdout).len(), 4);

    let (stdout, _, success) = run_docqa(&config_path, &["list"]);
    assert!(success);
    for name in ["contract.txt", "inventory.csv", "handbook.docx", "schedule.pdf"] {
        assert!(stdout.contains(name), "list missing {}: {}", name, stdout);
    }
    assert_eq!(stdout.matches("ready").count(), 4, "stdout={}", stdout);
}

#[test]
fn test_ingest_short_file_marks_error() {
    let (tmp, config_path) = setup_test_env();
    let short = tmp.path().join("short.txt");
    fs::write(&short, "too short to keep").unwrap();

    let (stdout, stderr, success) = run_docqa(&config_path, &["ingest", short.to_str().unwrap()]);
    assert!(!success, "short file should fail: stdout={}", stdout);
    assert!(stdout.contains("not enough extractable text"), "stdout={} stderr={}", stdout, stderr);

    let (stdout, _, _) = run_docqa(&config_path, &["list"]);
    assert!(stdout.contains("error"), "stdout={}", stdout);
    assert!(stdout.contains("short.txt"));
}

#[test]
fn test_ingest_single_file_with_name() {
    let (_tmp, config_path) = setup_test_env();
    let file = files_dir(&config_path).join("contract.txt");

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--name", "supplier-contract.txt"],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);

    let (stdout, _, _) = run_docqa(&config_path, &["list"]);
    assert!(stdout.contains("supplier-contract.txt"));
}

#[test]
fn test_context_keyword_ranking() {
    let (_tmp, config_path) = setup_test_env();
    let dir = files_dir(&config_path);
    run_docqa(&config_path, &["ingest", dir.to_str().unwrap()]);

    let (stdout, stderr, success) =
        run_docqa(&config_path, &["context", "What is the penalty clause"]);
    assert!(success, "context failed: stderr={}", stderr);

    let bundle: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(bundle["mode"], "keyword");
    assert_eq!(bundle["chunks"][0]["sourceLabel"], "contract.txt");
    assert_eq!(bundle["sources"][0]["documentName"], "contract.txt");
    assert!(bundle["context"]
        .as_str()
        .unwrap()
        .starts_with("[From: contract.txt]\n"));
    assert_eq!(bundle["sources"].as_array().unwrap().len(), 4);
}

#[test]
fn test_context_summary_mode_and_doc_filter() {
    let (_tmp, config_path) = setup_test_env();
    let pdf = files_dir(&config_path).join("schedule.pdf");
    let txt = files_dir(&config_path).join("contract.txt");
    let (stdout, _, _) = run_docqa(&config_path, &["ingest", pdf.to_str().unwrap()]);
    let pdf_id = ingested_ids(&stdout).remove(0);
    run_docqa(&config_path, &["ingest", txt.to_str().unwrap()]);

    let (stdout, _, success) = run_docqa(
        &config_path,
        &["context", "Summarize this document", "--doc", &pdf_id],
    );
    assert!(success);
    let bundle: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(bundle["mode"], "summary");
    let chunks = bundle["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["sourceLabel"], "schedule.pdf");
    assert!(chunks[0]["content"].as_str().unwrap().contains("maintenance"));
}

#[test]
fn test_context_without_documents_uses_placeholder() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (stdout, _, success) = run_docqa(&config_path, &["context", "anything at all"]);
    assert!(success);
    let bundle: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(bundle["context"], "No relevant content found in the documents.");
    assert!(bundle["sources"].as_array().unwrap().is_empty());
}

#[test]
fn test_get_and_delete() {
    let (_tmp, config_path) = setup_test_env();
    let file = files_dir(&config_path).join("handbook.docx");
    let (stdout, _, _) = run_docqa(&config_path, &["ingest", file.to_str().unwrap()]);
    let id = ingested_ids(&stdout).remove(0);

    let (stdout, stderr, success) = run_docqa(&config_path, &["get", &id]);
    assert!(success, "get failed: {}", stderr);
    assert!(stdout.contains("handbook.docx"));
    assert!(stdout.contains("status:       ready"));
    assert!(stdout.contains("[chunk 0]"));
    assert!(stdout.contains("safety training"));

    let (_, _, success) = run_docqa(&config_path, &["delete", &id]);
    assert!(success);

    let (_, stderr, success) = run_docqa(&config_path, &["get", &id]);
    assert!(!success);
    assert!(stderr.contains("document not found"));

    let (_, _, success) = run_docqa(&config_path, &["delete", &id]);
    assert!(!success, "second delete should fail");
}

#[test]
fn test_ask_fails_when_llm_unreachable() {
    let (_tmp, config_path) = setup_test_env();
    let file = files_dir(&config_path).join("contract.txt");
    run_docqa(&config_path, &["ingest", file.to_str().unwrap()]);

    let (_, stderr, success) = run_docqa(&config_path, &["ask", "What is the penalty clause"]);
    assert!(!success);
    assert!(stderr.contains("LLM request failed"), "stderr={}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let content = fs::read_to_string(&config_path).unwrap();
    fs::write(
        &config_path,
        content.replace("insert_batch_size = 2", "insert_batch_size = 0"),
    )
    .unwrap();

    let (_, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("insert_batch_size"), "stderr={}", stderr);
}
