//! Grounds the run in the owner's documents.
//!
//! Provider failures never abort the run: the context gets an empty
//! `retrieved_context` plus an `error` annotation and execution continues.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::retrieval::{retrieve, RetrievalRequest};
use crate::{ExecutionContext, NodeEnv, NodeError};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.1;
pub const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Restrict retrieval to these documents; empty means all of the
    /// owner's documents.
    pub documents: Vec<Uuid>,
    pub similarity_threshold: f32,
    pub max_results: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl Config {
    pub fn from_value(value: &Value) -> Result<Self, NodeError> {
        super::parse_config("knowledge_retrieval", value)
    }

    /// Decode for a run: fields that do not fit fall back to their
    /// defaults and are reported as warnings.
    pub fn from_value_lenient(value: &Value) -> (Self, Vec<String>) {
        super::parse_config_lenient("knowledge_retrieval", value)
    }
}

pub async fn run(
    config: &Config,
    ctx: ExecutionContext,
    env: &NodeEnv<'_>,
) -> Result<ExecutionContext, NodeError> {
    let query = ctx.query.clone().unwrap_or_default();
    let request = RetrievalRequest {
        query: &query,
        documents: (!config.documents.is_empty()).then_some(config.documents.as_slice()),
        similarity_threshold: config.similarity_threshold,
        max_results: config.max_results,
    };

    match retrieve(env, &request).await {
        Ok(chunks) => {
            info!(run_id = %env.run_id, "found {} relevant chunks", chunks.len());
            Ok(ctx.with_retrieval(chunks))
        }
        Err(e) => {
            warn!(run_id = %env.run_id, "knowledge retrieval failed: {e}");
            Ok(ctx.with_failed_retrieval(format!("knowledge retrieval failed: {e}")))
        }
    }
}
