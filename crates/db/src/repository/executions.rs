//! Workflow execution history.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{ExecutionStatus, WorkflowExecutionRow},
    DbError,
};

/// Create a new workflow execution record in `running` status.
pub async fn create_execution(
    pool: &PgPool,
    workflow_id: Uuid,
    input: serde_json::Value,
) -> Result<WorkflowExecutionRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowExecutionRow>(
        r#"
        INSERT INTO workflow_executions (id, workflow_id, status, input_data, started_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, workflow_id, status, input_data, output_data, error_message,
                  duration_seconds, tokens_used, started_at, completed_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(workflow_id)
    .bind(ExecutionStatus::Running.as_str())
    .bind(input)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Mark an execution `completed` with its output.
pub async fn complete_execution(
    pool: &PgPool,
    execution_id: Uuid,
    output: serde_json::Value,
    duration_seconds: f64,
    tokens_used: Option<i32>,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE workflow_executions
        SET status = $1, output_data = $2, duration_seconds = $3, tokens_used = $4,
            completed_at = $5
        WHERE id = $6
        "#,
    )
    .bind(ExecutionStatus::Completed.as_str())
    .bind(output)
    .bind(duration_seconds)
    .bind(tokens_used)
    .bind(Utc::now())
    .bind(execution_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark an execution `failed` with the error that aborted it.
pub async fn fail_execution(
    pool: &PgPool,
    execution_id: Uuid,
    error_message: &str,
    duration_seconds: f64,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE workflow_executions
        SET status = $1, error_message = $2, duration_seconds = $3, completed_at = $4
        WHERE id = $5
        "#,
    )
    .bind(ExecutionStatus::Failed.as_str())
    .bind(error_message)
    .bind(duration_seconds)
    .bind(Utc::now())
    .bind(execution_id)
    .execute(pool)
    .await?;

    Ok(())
}
