//! Workflow CRUD operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{WorkflowRow, WorkflowStatus},
    DbError,
};

const WORKFLOW_COLUMNS: &str = "id, owner_id, name, description, definition, status, \
     execution_count, last_executed, created_at, updated_at";

/// Insert a new workflow into the database.
///
/// `definition` must be a valid JSON object produced by serialising the
/// domain `Workflow` type from the `engine` crate.
pub async fn create_workflow(
    pool: &PgPool,
    id: Uuid,
    owner_id: Uuid,
    name: &str,
    description: Option<&str>,
    definition: serde_json::Value,
    status: WorkflowStatus,
) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRow>(&format!(
        r#"
        INSERT INTO workflows (id, owner_id, name, description, definition, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {WORKFLOW_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(owner_id)
    .bind(name)
    .bind(description)
    .bind(definition)
    .bind(status.as_str())
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRow>(&format!(
        "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Set the lifecycle status of a workflow.
///
/// Returns `DbError::NotFound` if no row was updated.
pub async fn set_status(pool: &PgPool, id: Uuid, status: WorkflowStatus) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE workflows SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Bump `execution_count` and stamp `last_executed`.
pub async fn record_run(pool: &PgPool, id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE workflows
        SET execution_count = execution_count + 1, last_executed = $1
        WHERE id = $2
        "#,
    )
    .bind(at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
