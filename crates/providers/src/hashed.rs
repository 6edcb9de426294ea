//! Deterministic offline embedder.
//!
//! Each text is hashed with SHA-256 together with a block counter; the
//! digest bytes are mapped into `[-1, 1]` until the vector reaches the
//! configured width. Equal texts always embed to equal vectors, which keeps
//! runs reproducible without an embedding service. The vectors carry no
//! semantic meaning.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use nodes::{EmbeddingProvider, ProviderError};

use crate::EMBEDDING_WIDTH;

#[derive(Debug, Clone, Copy)]
pub struct HashedEmbedder {
    dimensions: usize,
}

impl HashedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Synchronous form of [`EmbeddingProvider::embed`].
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimensions);
        let mut block: u32 = 0;

        while vector.len() < self.dimensions {
            let digest = Sha256::new()
                .chain_update(text.as_bytes())
                .chain_update(block.to_le_bytes())
                .finalize();
            vector.extend(
                digest
                    .iter()
                    .take(self.dimensions - vector.len())
                    .map(|byte| f32::from(*byte) / 127.5 - 1.0),
            );
            block += 1;
        }

        vector
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_WIDTH)
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(self.embed_sync(text))
    }

    fn name(&self) -> &'static str {
        "hashed"
    }
}
