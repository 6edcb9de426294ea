//! In-process document store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{DocumentStore, ProviderError, StoredChunk};

/// A [`DocumentStore`] backed by a map of owner → chunks.
///
/// Used for offline runs from the CLI and by tests.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    chunks: RwLock<HashMap<Uuid, Vec<StoredChunk>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store where every chunk belongs to `owner_id`.
    pub fn with_chunks(owner_id: Uuid, chunks: Vec<StoredChunk>) -> Self {
        let store = Self::new();
        for chunk in chunks {
            store.insert(owner_id, chunk);
        }
        store
    }

    pub fn insert(&self, owner_id: Uuid, chunk: StoredChunk) {
        let mut guard = match self.chunks.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.entry(owner_id).or_default().push(chunk);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_chunks(
        &self,
        owner_id: Uuid,
        documents: Option<&[Uuid]>,
    ) -> Result<Vec<StoredChunk>, ProviderError> {
        let guard = self
            .chunks
            .read()
            .map_err(|_| ProviderError::Store("chunk map lock poisoned".into()))?;

        let owned = guard.get(&owner_id).map(Vec::as_slice).unwrap_or_default();
        Ok(owned
            .iter()
            .filter(|chunk| !chunk.embedding.is_empty())
            .filter(|chunk| documents.map_or(true, |ids| ids.contains(&chunk.document_id)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(document_id: Uuid, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            document_id,
            document_title: "t".into(),
            content: "c".into(),
            embedding,
        }
    }

    #[tokio::test]
    async fn scopes_by_owner_and_document_filter() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (doc_a, doc_b) = (Uuid::new_v4(), Uuid::new_v4());

        let store = InMemoryDocumentStore::new();
        store.insert(owner, chunk(doc_a, vec![1.0]));
        store.insert(owner, chunk(doc_b, vec![1.0]));
        store.insert(other, chunk(doc_a, vec![1.0]));

        assert_eq!(store.list_chunks(owner, None).await.unwrap().len(), 2);
        assert_eq!(store.list_chunks(other, None).await.unwrap().len(), 1);

        let filtered = store.list_chunks(owner, Some(&[doc_b])).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].document_id, doc_b);
    }

    #[tokio::test]
    async fn unembedded_chunks_are_hidden() {
        let owner = Uuid::new_v4();
        let store = InMemoryDocumentStore::with_chunks(owner, vec![chunk(Uuid::nil(), vec![])]);
        assert!(store.list_chunks(owner, None).await.unwrap().is_empty());
    }
}
