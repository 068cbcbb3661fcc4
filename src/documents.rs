//! Document and chunk persistence.
//!
//! Used by the ingestion pipeline (create, status transitions, chunk
//! replacement), retrieval (candidate pool) and the `list`/`get`/`delete`
//! surfaces of both the CLI and the HTTP server.

use anyhow::{anyhow, Context, Result};
use docqa_core::{Chunk, FormatTag};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::app::App;
use crate::models::{format_ts_iso, ChunkRecord, DocumentDetail, DocumentRecord, DocumentStatus};
use crate::storage::ObjectStore;

const DOCUMENT_COLUMNS: &str = "id, name, format, size_bytes, content_hash, storage_key, status, error_message, chunk_count, created_at, updated_at";

/// Fields of a document row at creation time.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub name: String,
    pub format: FormatTag,
    pub size_bytes: i64,
    pub content_hash: String,
    pub storage_key: String,
}

/// A chunk insert batch failed. Batches before it stay committed.
#[derive(Debug)]
pub struct BatchInsertError {
    pub inserted: usize,
    pub source: sqlx::Error,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub async fn insert_document(pool: &SqlitePool, doc: &NewDocument) -> Result<DocumentRecord> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO documents (id, name, format, size_bytes, content_hash, storage_key, status, error_message, chunk_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 'pending', NULL, 0, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.name)
    .bind(doc.format.as_str())
    .bind(doc.size_bytes)
    .bind(&doc.content_hash)
    .bind(&doc.storage_key)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    find_document(pool, &doc.id)
        .await?
        .ok_or_else(|| anyhow!("document vanished after insert: {}", doc.id))
}

/// Move a document to `status`. `error_message` is cleared unless given.
pub async fn set_status(
    pool: &SqlitePool,
    id: &str,
    status: DocumentStatus,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE documents SET status = ?, error_message = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(error_message)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_ready(pool: &SqlitePool, id: &str, chunk_count: usize) -> Result<()> {
    sqlx::query(
        "UPDATE documents SET status = 'ready', error_message = NULL, chunk_count = ?, updated_at = ? WHERE id = ?",
    )
    .bind(chunk_count as i64)
    .bind(chrono::Utc::now().timestamp())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_document(pool: &SqlitePool, id: &str) -> Result<Option<DocumentRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM documents WHERE id = ?",
        DOCUMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(document_from_row).transpose()
}

/// All documents, newest first.
pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<DocumentRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM documents ORDER BY created_at DESC, id DESC",
        DOCUMENT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(document_from_row).collect()
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<DocumentDetail>> {
    let document = match find_document(pool, id).await? {
        Some(doc) => doc,
        None => return Ok(None),
    };

    let chunk_rows = sqlx::query(
        "SELECT chunk_index, content FROM chunks WHERE document_id = ? ORDER BY chunk_index ASC",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let chunks = chunk_rows
        .iter()
        .map(|row| ChunkRecord {
            index: row.get("chunk_index"),
            content: row.get("content"),
        })
        .collect();

    Ok(Some(DocumentDetail { document, chunks }))
}

/// Delete a document, its chunks and its blob. Returns `false` if unknown.
pub async fn delete_document(
    pool: &SqlitePool,
    store: &dyn ObjectStore,
    id: &str,
) -> Result<bool> {
    let storage_key: Option<String> =
        sqlx::query_scalar("SELECT storage_key FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    let storage_key = match storage_key {
        Some(key) => key,
        None => return Ok(false),
    };

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    if let Err(e) = store.delete(&storage_key).await {
        tracing::warn!(document_id = id, "failed to delete blob {}: {:#}", storage_key, e);
    }

    tracing::info!(document_id = id, "document deleted");
    Ok(true)
}

/// Replace a document's chunks: delete existing rows, then insert in batches
/// of `batch_size`, one transaction per batch.
///
/// Re-running after a failure starts from a clean slate, so partial inserts
/// are recovered by processing the document again.
pub async fn replace_chunks(
    pool: &SqlitePool,
    document_id: &str,
    format: FormatTag,
    chunks: &[Chunk],
    batch_size: usize,
) -> std::result::Result<usize, BatchInsertError> {
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(pool)
        .await
        .map_err(|source| BatchInsertError {
            inserted: 0,
            source,
        })?;

    let mut inserted = 0;
    for batch in chunks.chunks(batch_size.max(1)) {
        insert_batch(pool, document_id, format, batch)
            .await
            .map_err(|source| BatchInsertError { inserted, source })?;
        inserted += batch.len();
        tracing::debug!(document_id, inserted, total = chunks.len(), "chunk batch stored");
    }
    Ok(inserted)
}

async fn insert_batch(
    pool: &SqlitePool,
    document_id: &str,
    format: FormatTag,
    batch: &[Chunk],
) -> std::result::Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO chunks (id, document_id, chunk_index, content, metadata_json, hash) ",
    );
    builder.push_values(batch, |mut row, chunk| {
        let hash = sha256_hex(chunk.content.as_bytes());
        let metadata = serde_json::json!({
            "documentName": chunk.source_label,
            "format": format.as_str(),
            "hash": hash,
        });
        row.push_bind(Uuid::new_v4().to_string())
            .push_bind(document_id.to_string())
            .push_bind(chunk.index as i64)
            .push_bind(chunk.content.clone())
            .push_bind(metadata.to_string())
            .push_bind(hash);
    });
    builder.build().execute(&mut *tx).await?;

    tx.commit().await
}

/// Candidate pool for relevance selection.
///
/// Chunks of `ready` documents (restricted to `document_ids` when non-empty),
/// ordered by document creation then chunk index, capped at `limit`. The
/// source label of each chunk is its document's name.
pub async fn fetch_candidates(
    pool: &SqlitePool,
    document_ids: &[String],
    limit: usize,
) -> Result<Vec<Chunk>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT c.chunk_index, c.content, d.name FROM chunks c JOIN documents d ON d.id = c.document_id WHERE d.status = 'ready'",
    );
    if !document_ids.is_empty() {
        builder.push(" AND d.id IN (");
        let mut ids = builder.separated(", ");
        for id in document_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(")");
    }
    builder.push(" ORDER BY d.created_at ASC, d.id ASC, c.chunk_index ASC LIMIT ");
    builder.push_bind(limit as i64);

    let rows = builder.build().fetch_all(pool).await?;
    let chunks = rows
        .iter()
        .map(|row| {
            let index: i64 = row.get("chunk_index");
            Chunk {
                content: row.get("content"),
                index: index as usize,
                source_label: row.get("name"),
            }
        })
        .collect();
    Ok(chunks)
}

fn document_from_row(row: &SqliteRow) -> Result<DocumentRecord> {
    let format: String = row.get("format");
    let status: String = row.get("status");
    let created_at: i64 = row.get("created_at");
    let updated_at: i64 = row.get("updated_at");

    Ok(DocumentRecord {
        id: row.get("id"),
        name: row.get("name"),
        format: format
            .parse::<FormatTag>()
            .with_context(|| format!("corrupt format column: {}", format))?,
        size_bytes: row.get("size_bytes"),
        content_hash: row.get("content_hash"),
        storage_key: row.get("storage_key"),
        status: status.parse::<DocumentStatus>()?,
        error_message: row.get("error_message"),
        chunk_count: row.get("chunk_count"),
        created_at: format_ts_iso(created_at),
        updated_at: format_ts_iso(updated_at),
    })
}

// ============ CLI entry points ============

pub async fn run_list(app: &App) -> Result<()> {
    let docs = list_documents(&app.pool).await?;
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:<6}  {:>6}  NAME",
        "ID", "STATUS", "FORMAT", "CHUNKS"
    );
    for doc in &docs {
        println!(
            "{:<36}  {:<10}  {:<6}  {:>6}  {}",
            doc.id, doc.status, doc.format, doc.chunk_count, doc.name
        );
    }
    Ok(())
}

pub async fn run_get(app: &App, id: &str) -> Result<()> {
    let detail = get_document(&app.pool, id)
        .await?
        .ok_or_else(|| anyhow!("document not found: {}", id))?;
    let doc = &detail.document;

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("name:         {}", doc.name);
    println!("format:       {}", doc.format);
    println!("size_bytes:   {}", doc.size_bytes);
    println!("content_hash: {}", doc.content_hash);
    println!("status:       {}", doc.status);
    if let Some(ref err) = doc.error_message {
        println!("error:        {}", err);
    }
    println!("created_at:   {}", doc.created_at);
    println!("updated_at:   {}", doc.updated_at);
    println!();

    println!("--- Chunks ({}) ---", detail.chunks.len());
    for chunk in &detail.chunks {
        println!("[chunk {}]", chunk.index);
        println!("{}", chunk.content);
        println!();
    }

    Ok(())
}

pub async fn run_delete(app: &App, id: &str) -> Result<()> {
    if !delete_document(&app.pool, app.store.as_ref(), id).await? {
        anyhow::bail!("document not found: {}", id);
    }
    println!("Deleted {}", id);
    Ok(())
}
