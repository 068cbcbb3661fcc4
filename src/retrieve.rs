//! Candidate pool retrieval and context assembly for a query.

use anyhow::Result;
use docqa_core::{ContextBundle, QueryMode};

use crate::app::App;
use crate::documents;

/// Select context for `query` from ready documents.
///
/// `document_ids` restricts the pool to those documents; empty means all.
pub async fn build_context(
    app: &App,
    query: &str,
    document_ids: &[String],
) -> Result<ContextBundle> {
    let mode = QueryMode::detect(query);
    let limit = mode.candidate_limit();
    let pool = documents::fetch_candidates(&app.pool, document_ids, limit).await?;
    let bundle = docqa_core::select(query, &pool);

    tracing::info!(
        ?mode,
        pool = pool.len(),
        selected = bundle.chunks.len(),
        "context assembled"
    );
    Ok(bundle)
}

/// CLI entry point for `docqa context`: prints the bundle as JSON.
pub async fn run_context(app: &App, query: &str, document_ids: &[String]) -> Result<()> {
    let bundle = build_context(app, query, document_ids).await?;
    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}
