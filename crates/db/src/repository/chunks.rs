//! Read access to embedded document chunks.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::ChunkRow, DbError};

/// List an owner's embedded chunks, optionally limited to `documents`.
///
/// Chunks without an embedding are skipped.
pub async fn list_chunks(
    pool: &PgPool,
    owner_id: Uuid,
    documents: Option<&[Uuid]>,
) -> Result<Vec<ChunkRow>, DbError> {
    let rows = sqlx::query_as::<_, ChunkRow>(
        r#"
        SELECT c.document_id, d.title AS document_title, c.content, c.embedding
        FROM document_chunks c
        JOIN documents d ON d.id = c.document_id
        WHERE d.owner_id = $1
          AND c.embedding IS NOT NULL
          AND cardinality(c.embedding) > 0
          AND ($2::uuid[] IS NULL OR c.document_id = ANY($2))
        ORDER BY d.created_at, c.document_id, c.chunk_index
        "#,
    )
    .bind(owner_id)
    .bind(documents.map(<[Uuid]>::to_vec))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
