//! RAG Retriever: nearest FAQ entries for a query.

use database::{faq, vector, FaqMatch, SqlitePool};
use provider_core::Embedder;
use tracing::debug;

use crate::error::RagError;

/// Default number of entries handed to the assembler.
pub const DEFAULT_TOP_K: usize = 3;

/// Text embedded for a stored FAQ entry.
pub fn faq_document(question: &str, answer: &str) -> String {
    format!("Question: {question} Answer: {answer}")
}

/// Embed a FAQ entry for storage.
///
/// `Ok(None)` means the embedder produced no vector; the entry can still be
/// stored, but it is invisible to retrieval until it is embedded.
pub async fn embed_faq(
    embedder: &dyn Embedder,
    question: &str,
    answer: &str,
) -> Result<Option<Vec<f32>>, RagError> {
    let Some(embedding) = embedder.embed(&faq_document(question, answer)).await? else {
        return Ok(None);
    };
    vector::check_dimensions(&embedding, embedder.dimensions())?;
    Ok(Some(embedding))
}

/// Rank `tenant_id`'s FAQ entries against `query`, closest first.
///
/// Returns an empty list when the query is blank, when no embedder is given, or
/// when the embedder produces no vector. Provider call failures are returned as
/// errors.
pub async fn retrieve(
    pool: &SqlitePool,
    embedder: Option<&dyn Embedder>,
    tenant_id: &str,
    query: &str,
    top_k: usize,
) -> Result<Vec<FaqMatch>, RagError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let Some(embedder) = embedder else {
        debug!(tenant_id, "No embedder available; skipping retrieval");
        return Ok(Vec::new());
    };

    let Some(vector) = embedder.embed(query).await? else {
        return Ok(Vec::new());
    };

    let matches = faq::query_nearest_faqs(pool, tenant_id, &vector, top_k).await?;
    debug!(
        tenant_id,
        embedder = embedder.name(),
        hits = matches.len(),
        "FAQ retrieval finished"
    );
    Ok(matches)
}
