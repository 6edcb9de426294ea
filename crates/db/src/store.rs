//! Postgres-backed [`DocumentStore`].

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use nodes::{DocumentStore, ProviderError, StoredChunk};

use crate::models::ChunkRow;
use crate::repository::chunks;
use crate::DbPool;

/// Serves retrieval from the `document_chunks` table.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: DbPool,
}

impl PgDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl From<ChunkRow> for StoredChunk {
    fn from(row: ChunkRow) -> Self {
        StoredChunk {
            document_id: row.document_id,
            document_title: row.document_title,
            content: row.content,
            embedding: row.embedding.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list_chunks(
        &self,
        owner_id: Uuid,
        documents: Option<&[Uuid]>,
    ) -> Result<Vec<StoredChunk>, ProviderError> {
        let rows = chunks::list_chunks(&self.pool, owner_id, documents)
            .await
            .map_err(|e| ProviderError::Store(e.to_string()))?;
        debug!(%owner_id, "loaded {} chunks", rows.len());
        Ok(rows.into_iter().map(StoredChunk::from).collect())
    }
}
