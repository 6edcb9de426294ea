//! Entry point of every workflow: captures the user's question.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{ExecutionContext, NodeEnv, NodeError};

/// Display-only options; nothing here affects execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub label: Option<String>,
    pub placeholder: Option<String>,
}

impl Config {
    pub fn from_value(value: &Value) -> Result<Self, NodeError> {
        super::parse_config("query_intake", value)
    }

    /// Decode for a run: fields that do not fit fall back to their
    /// defaults and are reported as warnings.
    pub fn from_value_lenient(value: &Value) -> (Self, Vec<String>) {
        super::parse_config_lenient("query_intake", value)
    }
}

/// Read `query` (or the `user_query` alias) and stamp the run.
///
/// # Errors
/// [`NodeError::MissingQuery`] when neither key holds non-blank text.
pub async fn run(
    _config: &Config,
    ctx: ExecutionContext,
    env: &NodeEnv<'_>,
) -> Result<ExecutionContext, NodeError> {
    let query = ctx
        .query
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .or_else(|| ctx.extra_str("user_query").filter(|q| !q.trim().is_empty()))
        .map(str::to_owned)
        .ok_or(NodeError::MissingQuery)?;

    let preview: String = query.chars().take(100).collect();
    info!(run_id = %env.run_id, "query received: {preview}");

    Ok(ctx.with_query(query, env.clock.now()))
}
