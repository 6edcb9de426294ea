//! Query-to-chunk retrieval.
//!
//! Embeds the query, lists the owner's chunks, scores each one with
//! [`cosine_similarity`], keeps those at or above the threshold, and returns
//! the best `max_results` in descending order of similarity.

use tracing::debug;
use uuid::Uuid;

use crate::{cosine_similarity, NodeEnv, ProviderError, RetrievedChunk, StoredChunk};

/// Parameters of a single retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalRequest<'a> {
    pub query: &'a str,
    /// Restrict candidates to these documents; `None` searches all of the
    /// owner's documents.
    pub documents: Option<&'a [Uuid]>,
    pub similarity_threshold: f32,
    pub max_results: usize,
}

/// Run a retrieval against the providers in `env`.
///
/// # Errors
/// Any embedding or store failure, including a step timeout.
pub async fn retrieve(
    env: &NodeEnv<'_>,
    request: &RetrievalRequest<'_>,
) -> Result<Vec<RetrievedChunk>, ProviderError> {
    let providers = env.providers;

    let query_vector = env.bounded(providers.embedder.embed(request.query)).await?;
    let candidates = env
        .bounded(providers.store.list_chunks(env.owner_id, request.documents))
        .await?;

    debug!(
        candidates = candidates.len(),
        embedder = providers.embedder.name(),
        "scoring candidate chunks"
    );

    Ok(rank(
        &query_vector,
        candidates,
        request.similarity_threshold,
        request.max_results,
    ))
}

/// Score, filter, sort and truncate `candidates` against `query_vector`.
pub fn rank(
    query_vector: &[f32],
    candidates: Vec<StoredChunk>,
    threshold: f32,
    max_results: usize,
) -> Vec<RetrievedChunk> {
    let mut ranked: Vec<RetrievedChunk> = candidates
        .into_iter()
        .filter(|chunk| !chunk.embedding.is_empty())
        .filter_map(|chunk| {
            let similarity = cosine_similarity(query_vector, &chunk.embedding);
            (similarity >= threshold).then(|| RetrievedChunk {
                content: chunk.content,
                similarity,
                document_title: chunk.document_title,
                document_id: chunk.document_id,
            })
        })
        .collect();

    // Stable, so equal scores keep store order.
    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    ranked.truncate(max_results);
    ranked
}
