//! Sub-command implementations.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use db::models::WorkflowStatus;
use db::repository::{executions, workflows};
use db::{DbError, DbPool, PgDocumentStore};
use engine::{validate_workflow, EngineError, ValidationResult, Workflow, WorkflowRunner};
use nodes::{DocumentStore, EmbeddingProvider, InMemoryDocumentStore, Providers, StoredChunk};

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Read and parse a workflow JSON file.
pub fn read_workflow(path: &Path) -> Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Workflow::from_json(value)?)
}

/// Human-readable validation report, one finding per line.
pub fn render_validation(result: &ValidationResult) -> String {
    let mut lines = Vec::new();
    lines.push(if result.valid {
        "workflow is valid".to_owned()
    } else {
        format!("workflow is invalid ({} errors)", result.errors.len())
    });
    lines.extend(result.errors.iter().map(|e| format!("  error: {e}")));
    lines.extend(result.warnings.iter().map(|w| format!("  warning: {w}")));
    lines.join("\n")
}

/// Caller input for a run.
pub fn run_input(query: &str, prompt: Option<&str>) -> Value {
    let mut input = json!({ "query": query });
    if let Some(prompt) = prompt {
        input["custom_prompt"] = json!(prompt);
    }
    input
}

/// One entry of a `--chunks` file. A missing embedding is computed from
/// `content` with the configured embedder.
#[derive(Debug, Deserialize)]
pub struct ChunkEntry {
    pub document_id: Uuid,
    pub document_title: String,
    pub content: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

pub async fn load_chunks(
    path: &Path,
    owner_id: Uuid,
    embedder: &dyn EmbeddingProvider,
) -> Result<InMemoryDocumentStore> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read chunks file {}", path.display()))?;
    let entries: Vec<ChunkEntry> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of chunks", path.display()))?;

    let store = InMemoryDocumentStore::new();
    for entry in entries {
        let embedding = if entry.embedding.is_empty() {
            embedder
                .embed(&entry.content)
                .await
                .with_context(|| format!("embedding chunk of '{}'", entry.document_title))?
        } else {
            entry.embedding
        };
        store.insert(
            owner_id,
            StoredChunk {
                document_id: entry.document_id,
                document_title: entry.document_title,
                content: entry.content,
                embedding,
            },
        );
    }
    Ok(store)
}

fn build_runner(
    config: &AppConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn DocumentStore>,
) -> WorkflowRunner {
    let providers = Providers {
        embedder,
        generator: providers::build_generator(&config.generation),
        store,
    };
    WorkflowRunner::new(providers, config.runner.runner_config())
}

async fn connect(config: &AppConfig) -> Result<DbPool> {
    let url = config
        .database
        .url
        .as_deref()
        .context("no database configured; set DOCFLOW__DATABASE__URL or --database-url")?;
    Ok(db::pool::create_pool(url, config.database.max_connections).await?)
}

/// A token cancelled on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            trigger.cancel();
        }
    });
    token
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// `validate <file>`. Returns whether the workflow is valid.
pub fn validate(path: &Path) -> Result<bool> {
    let workflow = read_workflow(path)?;
    let result = validate_workflow(&workflow);
    println!("{}", render_validation(&result));
    Ok(result.valid)
}

/// `run <file>`: execute a workflow file and print the final context.
pub async fn run(
    config: &AppConfig,
    path: &Path,
    query: &str,
    prompt: Option<&str>,
    owner_id: Uuid,
    chunks: Option<&Path>,
) -> Result<()> {
    let workflow = read_workflow(path)?;
    let result = validate_workflow(&workflow);
    if !result.valid {
        bail!("{}", render_validation(&result));
    }
    for warning in &result.warnings {
        warn!("{warning}");
    }

    let embedder = providers::build_embedder(&config.embedding)?;
    let store: Arc<dyn DocumentStore> = match chunks {
        Some(chunks) => Arc::new(load_chunks(chunks, owner_id, embedder.as_ref()).await?),
        None if config.database.url.is_some() => {
            Arc::new(PgDocumentStore::new(connect(config).await?))
        }
        None => Arc::new(InMemoryDocumentStore::new()),
    };

    let runner = build_runner(config, embedder, store);
    let report = runner
        .execute_with_cancel(
            owner_id,
            &workflow.nodes,
            &workflow.edges,
            run_input(query, prompt),
            &cancel_on_interrupt(),
        )
        .await?;

    info!(visited = ?report.visited, "run finished in {:?}", report.elapsed);
    println!("{}", serde_json::to_string_pretty(&report.context)?);
    Ok(())
}

/// `save <file>`: validate and persist; returns whether it was valid.
pub async fn save(config: &AppConfig, path: &Path, owner_id: Uuid) -> Result<bool> {
    let workflow = read_workflow(path)?;
    let result = validate_workflow(&workflow);
    let status = if result.valid {
        WorkflowStatus::Active
    } else {
        WorkflowStatus::Invalid
    };

    let pool = connect(config).await?;
    let row = workflows::create_workflow(
        &pool,
        workflow.id,
        owner_id,
        &workflow.name,
        workflow.description.as_deref(),
        serde_json::to_value(&workflow)?,
        status,
    )
    .await?;

    info!(workflow_id = %row.id, %status, "workflow saved");
    println!("{}\t{}", row.id, status);
    println!("{}", render_validation(&result));
    Ok(result.valid)
}

/// `validate-stored <id>`: re-validate a stored workflow and update its
/// status. Returns whether it is valid.
pub async fn validate_stored(config: &AppConfig, id: Uuid) -> Result<bool> {
    let pool = connect(config).await?;
    let row = workflows::get_workflow(&pool, id).await?;

    let result = match Workflow::from_json(row.definition) {
        Ok(workflow) => validate_workflow(&workflow),
        Err(e) => ValidationResult {
            valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    };
    let status = if result.valid {
        WorkflowStatus::Active
    } else {
        WorkflowStatus::Invalid
    };
    workflows::set_status(&pool, id, status).await?;

    info!(workflow_id = %id, %status, "workflow validated");
    println!("{}", render_validation(&result));
    Ok(result.valid)
}

/// `execute <id>`: run a stored, active workflow and record the execution.
pub async fn execute(
    config: &AppConfig,
    id: Uuid,
    query: &str,
    prompt: Option<&str>,
) -> Result<()> {
    let pool = connect(config).await?;
    let row = workflows::get_workflow(&pool, id).await?;

    let status = row.status()?;
    if status != WorkflowStatus::Active {
        bail!(
            "workflow {id} is {status}; only active workflows can be executed \
             (run validate-stored first)"
        );
    }
    let workflow = Workflow::from_json(row.definition)?;

    let embedder = providers::build_embedder(&config.embedding)?;
    let runner = build_runner(config, embedder, Arc::new(PgDocumentStore::new(pool.clone())));

    let input = run_input(query, prompt);
    let execution = executions::create_execution(&pool, id, input.clone()).await?;
    let started = Instant::now();

    let outcome = runner
        .execute_with_cancel(
            row.owner_id,
            &workflow.nodes,
            &workflow.edges,
            input,
            &cancel_on_interrupt(),
        )
        .await;

    match outcome {
        Ok(report) => {
            let tokens = report.context.prompt_tokens.and_then(|t| i32::try_from(t).ok());
            let output = serde_json::to_value(&report.context)?;
            executions::complete_execution(
                &pool,
                execution.id,
                output,
                report.elapsed.as_secs_f64(),
                tokens,
            )
            .await?;
            workflows::record_run(&pool, id, Utc::now()).await?;

            info!(execution_id = %execution.id, "execution completed");
            println!("{}", serde_json::to_string_pretty(&report.context)?);
            Ok(())
        }
        Err(e) => {
            let message = e.to_string();
            let record = executions::fail_execution(
                &pool,
                execution.id,
                &message,
                started.elapsed().as_secs_f64(),
            );
            Err(record_failure(execution.id, e, record).await)
        }
    }
}

/// Log a failed run and mark its execution row failed. The run error is
/// kept even when the row cannot be updated.
async fn record_failure<F>(execution_id: Uuid, run_error: EngineError, record: F) -> anyhow::Error
where
    F: Future<Output = Result<(), DbError>>,
{
    error!(execution_id = %execution_id, "execution failed: {run_error}");
    let failed = anyhow::Error::new(run_error).context(format!("execution {execution_id} failed"));
    match record.await {
        Ok(()) => failed,
        Err(db_error) => {
            warn!(execution_id = %execution_id, "could not record failure: {db_error}");
            failed.context(format!("could not record the failure ({db_error})"))
        }
    }
}

/// `migrate`: apply pending migrations.
pub async fn migrate(config: &AppConfig) -> Result<()> {
    let pool = connect(config).await?;
    db::pool::run_migrations(&pool).await?;
    info!("migrations applied successfully");
    Ok(())
}
