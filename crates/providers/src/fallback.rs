//! Embedder that degrades to deterministic hashing.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use nodes::{EmbeddingProvider, ProviderError};

use crate::HashedEmbedder;

/// Tries `primary` first; on any error returns a hashed embedding instead.
///
/// Query vectors produced by the fallback only match chunks embedded the
/// same way, so retrieval quality drops but the run keeps going.
pub struct FallbackEmbedder {
    primary: Arc<dyn EmbeddingProvider>,
    fallback: HashedEmbedder,
}

impl FallbackEmbedder {
    pub fn new(primary: Arc<dyn EmbeddingProvider>, fallback: HashedEmbedder) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        match self.primary.embed(text).await {
            Ok(vector) => Ok(vector),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    "embedding failed, using hashed fallback: {e}"
                );
                self.fallback.embed(text).await
            }
        }
    }

    fn name(&self) -> &'static str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::mock::{FailingEmbedder, StubEmbedder};

    #[tokio::test]
    async fn primary_result_wins() {
        let embedder = FallbackEmbedder::new(
            Arc::new(StubEmbedder::constant(vec![1.0, 2.0])),
            HashedEmbedder::new(2),
        );
        assert_eq!(embedder.embed("x").await.unwrap(), vec![1.0, 2.0]);
        assert_eq!(embedder.name(), "stub");
    }

    #[tokio::test]
    async fn failure_falls_back_to_hashing() {
        let hashed = HashedEmbedder::new(8);
        let embedder = FallbackEmbedder::new(Arc::new(FailingEmbedder::new("down")), hashed);
        assert_eq!(embedder.embed("x").await.unwrap(), hashed.embed_sync("x"));
    }
}
