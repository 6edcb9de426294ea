//! Deterministic test doubles for the provider traits.
//!
//! Useful in unit and integration tests where a real embedding service or
//! language model is either unavailable or irrelevant.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::{
    Clock, DocumentStore, EmbeddingProvider, GenerationProvider, ProviderError, Providers,
};

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// Answers every text with the same vector.
pub struct StubEmbedder {
    vector: Vec<f32>,
    /// All texts seen by this embedder (in call order).
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl StubEmbedder {
    /// Create an embedder that answers every text with `vector`.
    pub fn constant(vector: Vec<f32>) -> Self {
        Self {
            vector,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this embedder has been called.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.lock().unwrap().push(text.to_owned());
        Ok(self.vector.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Always fails with [`ProviderError::Unavailable`].
pub struct FailingEmbedder {
    pub message: String,
}

impl FailingEmbedder {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::unavailable("stub-embedder", self.message.clone()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// What a [`StubGenerator`] was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationCall {
    Prompt(String),
    WithContext { query: String, context: Vec<String> },
}

/// Behaviour injected into [`StubGenerator`] at construction time.
pub enum GeneratorBehaviour {
    /// Return a fixed string.
    Reply(String),
    /// Fail with a provider error.
    Fail(ProviderError),
    /// Never resolve.
    Hang,
}

/// A generator that records every call and answers per its behaviour.
pub struct StubGenerator {
    pub behaviour: GeneratorBehaviour,
    /// All calls seen by this generator (in call order).
    pub calls: Arc<Mutex<Vec<GenerationCall>>>,
}

impl StubGenerator {
    /// Create a generator that always replies with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::from_behaviour(GeneratorBehaviour::Reply(text.into()))
    }

    /// Create a generator that always fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::from_behaviour(GeneratorBehaviour::Fail(error))
    }

    /// Create a generator whose calls never complete.
    pub fn hanging() -> Self {
        Self::from_behaviour(GeneratorBehaviour::Hang)
    }

    fn from_behaviour(behaviour: GeneratorBehaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn answer(&self) -> Result<String, ProviderError> {
        match &self.behaviour {
            GeneratorBehaviour::Reply(text) => Ok(text.clone()),
            GeneratorBehaviour::Fail(err) => Err(err.clone()),
            GeneratorBehaviour::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl GenerationProvider for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push(GenerationCall::Prompt(prompt.to_owned()));
        self.answer().await
    }

    async fn generate_with_context(
        &self,
        query: &str,
        context_texts: &[String],
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(GenerationCall::WithContext {
            query: query.to_owned(),
            context: context_texts.to_vec(),
        });
        self.answer().await
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Bundle doubles into a [`Providers`] set.
pub fn providers(
    embedder: impl EmbeddingProvider + 'static,
    generator: impl GenerationProvider + 'static,
    store: impl DocumentStore + 'static,
) -> Providers {
    Providers {
        embedder: Arc::new(embedder),
        generator: Arc::new(generator),
        store: Arc::new(store),
    }
}
