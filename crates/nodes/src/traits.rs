//! Provider seams consumed by the node handlers.
//!
//! Implementations live outside this crate (HTTP adapters in `providers`,
//! the Postgres store in `db`); the doubles in [`crate::mock`] and
//! [`crate::store::InMemoryDocumentStore`] cover tests and offline runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProviderError;

/// An already-embedded document fragment owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub document_id: Uuid,
    pub document_title: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Turns text into a fixed-width vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Produces text from a prompt.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Answer `query` grounded in `context_texts`.
    ///
    /// The default wraps the texts and the question into a single prompt.
    async fn generate_with_context(
        &self,
        query: &str,
        context_texts: &[String],
    ) -> Result<String, ProviderError> {
        let prompt = format!(
            "You are an assistant helping users understand their documents. \
             Use the provided context to answer the question accurately.\n\n\
             Context Documents:\n{}\n\n\
             User Question: {}\n\n\
             If the answer is not directly available in the context, say so and \
             give the best guidance the context allows.",
            context_texts.join("\n\n"),
            query,
        );
        self.generate(&prompt).await
    }

    /// Model identifier reported when a node does not configure one.
    fn model_name(&self) -> &str;
}

/// Read-only access to a user's embedded chunks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List chunks owned by `owner_id`, optionally restricted to the given
    /// document ids. Chunks without an embedding are not returned.
    async fn list_chunks(
        &self,
        owner_id: Uuid,
        documents: Option<&[Uuid]>,
    ) -> Result<Vec<StoredChunk>, ProviderError>;
}

/// Source of wall-clock time for the intake timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The external services a run may call.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationProvider>,
    pub store: Arc<dyn DocumentStore>,
}

/// Per-run environment handed to every handler.
pub struct NodeEnv<'a> {
    /// ID of the current run.
    pub run_id: Uuid,
    /// The user whose documents retrieval is scoped to.
    pub owner_id: Uuid,
    pub providers: &'a Providers,
    pub clock: &'a dyn Clock,
    /// Upper bound for each provider call.
    pub step_timeout: Duration,
}

impl NodeEnv<'_> {
    /// Await a provider call, failing with [`ProviderError::Timeout`] once
    /// the step deadline passes.
    pub async fn bounded<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.step_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.step_timeout)),
        }
    }
}
