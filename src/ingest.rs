//! Ingestion pipeline orchestration.
//!
//! `upload` → blob store + `pending` row; `process` → download, extract and
//! chunk on a blocking thread, replace stored chunks, mark `ready`. Failures
//! leave the document in `error` with a message; nothing is retried.
//! Re-processing a document deletes its chunks before inserting again.

use anyhow::Context;
use docqa_core::{Chunker, ExtractionError, FormatTag, RawDocument, UnsupportedFormat};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::app::App;
use crate::documents::{self, NewDocument};
use crate::models::{DocumentRecord, DocumentStatus};
use crate::storage::storage_key;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Rejected at upload, before anything is stored.
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("failed to download {key}: {message}")]
    Download { key: String, message: String },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("chunk insert failed after {inserted} of {total} chunks: {source}")]
    Insert {
        inserted: usize,
        total: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Result of processing one document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessOutcome {
    pub document_id: String,
    pub chunk_count: usize,
    pub extracted_chars: usize,
}

/// Store `bytes` under a new document id and record it as `pending`.
pub async fn upload(app: &App, name: &str, bytes: &[u8]) -> Result<DocumentRecord, PipelineError> {
    let format = FormatTag::from_filename(name)?;
    let id = Uuid::new_v4().to_string();
    let key = storage_key(&id, name);

    app.store
        .put(&key, bytes)
        .await
        .with_context(|| format!("Failed to store upload {}", name))?;

    let record = documents::insert_document(
        &app.pool,
        &NewDocument {
            id,
            name: name.to_string(),
            format,
            size_bytes: bytes.len() as i64,
            content_hash: documents::sha256_hex(bytes),
            storage_key: key,
        },
    )
    .await?;

    tracing::info!(
        document_id = %record.id,
        name,
        %format,
        size_bytes = record.size_bytes,
        "document uploaded"
    );
    Ok(record)
}

/// Extract, chunk and store the chunks of an uploaded document.
pub async fn process(app: &App, id: &str) -> Result<ProcessOutcome, PipelineError> {
    let doc = documents::find_document(&app.pool, id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;

    documents::set_status(&app.pool, id, DocumentStatus::Processing, None).await?;
    tracing::info!(document_id = id, name = %doc.name, "processing document");

    let bytes = match app.store.get(&doc.storage_key).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = PipelineError::Download {
                key: doc.storage_key.clone(),
                message: format!("{:#}", e),
            };
            fail(app, id, &err).await?;
            return Err(err);
        }
    };

    let format = doc.format;
    let raw = RawDocument::new(doc.name.clone(), format, bytes);
    let extracted = tokio::task::spawn_blocking(move || {
        docqa_core::extract_document(&raw).map(|text| {
            let chars = text.char_count();
            (chars, Chunker::default().chunk(text.as_str(), &raw.name))
        })
    })
    .await
    .context("extraction task panicked")?;

    let (extracted_chars, chunks) = match extracted {
        Ok(out) => out,
        Err(e) => {
            let err = PipelineError::Extraction(e);
            fail(app, id, &err).await?;
            return Err(err);
        }
    };

    let batch_size = app.config.chunking.insert_batch_size;
    if let Err(e) =
        documents::replace_chunks(&app.pool, id, format, &chunks, batch_size).await
    {
        let err = PipelineError::Insert {
            inserted: e.inserted,
            total: chunks.len(),
            source: e.source,
        };
        fail(app, id, &err).await?;
        return Err(err);
    }

    documents::mark_ready(&app.pool, id, chunks.len()).await?;
    tracing::info!(
        document_id = id,
        chunks = chunks.len(),
        chars = extracted_chars,
        "document ready"
    );

    Ok(ProcessOutcome {
        document_id: id.to_string(),
        chunk_count: chunks.len(),
        extracted_chars,
    })
}

async fn fail(app: &App, id: &str, err: &PipelineError) -> anyhow::Result<()> {
    tracing::warn!(document_id = id, "processing failed: {}", err);
    documents::set_status(&app.pool, id, DocumentStatus::Error, Some(&err.to_string())).await
}

/// Upload and immediately process one file.
pub async fn ingest_bytes(
    app: &App,
    name: &str,
    bytes: &[u8],
) -> Result<(DocumentRecord, ProcessOutcome), PipelineError> {
    let record = upload(app, name, bytes).await?;
    let outcome = process(app, &record.id).await?;
    Ok((record, outcome))
}

/// Per-run summary of [`ingest_path`].
#[derive(Debug, Default)]
pub struct IngestReport {
    pub ingested: Vec<ProcessOutcome>,
    pub failed: Vec<(PathBuf, String)>,
    pub skipped: usize,
}

impl IngestReport {
    pub fn chunks_written(&self) -> usize {
        self.ingested.iter().map(|o| o.chunk_count).sum()
    }
}

/// Ingest a single file, or every supported file below a directory.
///
/// `name` overrides the stored document name and is only allowed for a
/// single file. Unsupported extensions inside a directory are skipped; a
/// single file with an unsupported extension is an error.
pub async fn ingest_path(
    app: &App,
    path: &Path,
    name: Option<&str>,
) -> anyhow::Result<IngestReport> {
    let mut report = IngestReport::default();

    let files: Vec<PathBuf> = if path.is_dir() {
        if name.is_some() {
            anyhow::bail!("--name can only be used when ingesting a single file");
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if FormatTag::from_filename(&file_name).is_err() {
                tracing::debug!(path = %entry.path().display(), "skipping unsupported file");
                report.skipped += 1;
                continue;
            }
            files.push(entry.into_path());
        }
        files
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        anyhow::bail!("path not found: {}", path.display());
    };

    for file in files {
        let display_name = match name {
            Some(n) => n.to_string(),
            None => file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string()),
        };
        let bytes = tokio::fs::read(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        match ingest_bytes(app, &display_name, &bytes).await {
            Ok((_, outcome)) => report.ingested.push(outcome),
            Err(PipelineError::Internal(e)) => return Err(e),
            Err(e) => report.failed.push((file, e.to_string())),
        }
    }

    Ok(report)
}

/// CLI entry point for `docqa ingest`.
pub async fn run_ingest(app: &App, path: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let report = ingest_path(app, path, name).await?;

    println!("ingest {}", path.display());
    println!("  documents ready: {}", report.ingested.len());
    println!("  chunks written: {}", report.chunks_written());
    if report.skipped > 0 {
        println!("  skipped (unsupported): {}", report.skipped);
    }
    for outcome in &report.ingested {
        println!("  + {} ({} chunks)", outcome.document_id, outcome.chunk_count);
    }
    for (file, err) in &report.failed {
        println!("  ! {}: {}", file.display(), err);
    }

    if report.ingested.is_empty() && !report.failed.is_empty() {
        anyhow::bail!("no documents ingested");
    }
    println!("ok");
    Ok(())
}
