//! Workflow execution engine.
//!
//! `WorkflowRunner` is the central orchestrator:
//! 1. Finds the `query_intake` entry node.
//! 2. Builds the [`ExecutionGraph`] for this run.
//! 3. Executes the entry node, then repeatedly follows the first unvisited
//!    outgoing edge until none is left.
//! 4. Threads the [`ExecutionContext`] through every handler and returns the
//!    final copy.
//!
//! Only a missing entry point, non-object input, a missing query, or
//! cancellation abort a run. Retrieval and generation failures are recorded
//! in the context, config fields that do not fit fall back to their
//! defaults with a warning, and execution continues.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use nodes::handlers::{generation, knowledge_retrieval, output_format, query_intake};
use nodes::{Clock, ExecutionContext, NodeEnv, Providers, SystemClock};

use crate::graph::ExecutionGraph;
use crate::models::{Edge, Node, NodeKind, Workflow};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound for each embedding, store, or generation call.
    pub step_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded node configs
// ---------------------------------------------------------------------------

/// A node's config decoded for its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    QueryIntake(query_intake::Config),
    KnowledgeRetrieval(knowledge_retrieval::Config),
    Generation(generation::Config),
    OutputFormat(output_format::Config),
}

/// Decode `node.config` into the config type of `node.kind`.
///
/// Strict: any field that does not fit is an error. Used by validation.
pub(crate) fn decode_config(node: &Node) -> Result<NodeConfig, EngineError> {
    let config = &node.config;
    let decoded = match node.kind {
        NodeKind::QueryIntake => {
            query_intake::Config::from_value(config).map(NodeConfig::QueryIntake)
        }
        NodeKind::KnowledgeRetrieval => {
            knowledge_retrieval::Config::from_value(config).map(NodeConfig::KnowledgeRetrieval)
        }
        NodeKind::Generation => {
            generation::Config::from_value(config).map(NodeConfig::Generation)
        }
        NodeKind::OutputFormat => {
            output_format::Config::from_value(config).map(NodeConfig::OutputFormat)
        }
    };
    decoded.map_err(|e| EngineError::from_node(&node.id, e))
}

/// Decode `node.config` for a run. Fields that do not fit keep their
/// defaults; each one is returned as a warning.
pub(crate) fn decode_config_lenient(node: &Node) -> (NodeConfig, Vec<String>) {
    let config = &node.config;
    match node.kind {
        NodeKind::QueryIntake => {
            let (c, w) = query_intake::Config::from_value_lenient(config);
            (NodeConfig::QueryIntake(c), w)
        }
        NodeKind::KnowledgeRetrieval => {
            let (c, w) = knowledge_retrieval::Config::from_value_lenient(config);
            (NodeConfig::KnowledgeRetrieval(c), w)
        }
        NodeKind::Generation => {
            let (c, w) = generation::Config::from_value_lenient(config);
            (NodeConfig::Generation(c), w)
        }
        NodeKind::OutputFormat => {
            let (c, w) = output_format::Config::from_value_lenient(config);
            (NodeConfig::OutputFormat(c), w)
        }
    }
}

// ---------------------------------------------------------------------------
// Output of a completed run
// ---------------------------------------------------------------------------

/// The result of running a full workflow.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// The context produced by the last node executed.
    pub context: ExecutionContext,
    /// Node IDs in execution order.
    pub visited: Vec<String>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// WorkflowRunner
// ---------------------------------------------------------------------------

/// Stateless orchestrator; one instance can serve many concurrent runs.
pub struct WorkflowRunner {
    providers: Providers,
    clock: Arc<dyn Clock>,
    config: RunnerConfig,
}

impl WorkflowRunner {
    pub fn new(providers: Providers, config: RunnerConfig) -> Self {
        Self {
            providers,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock used for the intake timestamp.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the graph and return the final context.
    ///
    /// # Errors
    /// See [`WorkflowRunner::execute_with_cancel`].
    pub async fn execute(
        &self,
        owner_id: Uuid,
        nodes: &[Node],
        edges: &[Edge],
        input: Value,
    ) -> Result<ExecutionContext, EngineError> {
        self.execute_traced(owner_id, nodes, edges, input)
            .await
            .map(|report| report.context)
    }

    /// Run a [`Workflow`] and return the final context.
    pub async fn execute_workflow(
        &self,
        owner_id: Uuid,
        workflow: &Workflow,
        input: Value,
    ) -> Result<ExecutionContext, EngineError> {
        self.execute(owner_id, &workflow.nodes, &workflow.edges, input)
            .await
    }

    /// Like [`WorkflowRunner::execute`], but also reports the path taken.
    pub async fn execute_traced(
        &self,
        owner_id: Uuid,
        nodes: &[Node],
        edges: &[Edge],
        input: Value,
    ) -> Result<RunReport, EngineError> {
        self.execute_with_cancel(owner_id, nodes, edges, input, &CancellationToken::new())
            .await
    }

    /// Run the graph until it ends or `cancel` fires.
    ///
    /// # Errors
    /// - [`EngineError::MissingEntryPoint`] if no node is a `query_intake`.
    /// - [`EngineError::InvalidInput`] if `input` cannot seed a context.
    /// - [`EngineError::NodeFailed`] if a handler aborts (e.g. no query).
    /// - [`EngineError::Cancelled`] if `cancel` fires mid-run.
    #[instrument(skip(self, nodes, edges, input, cancel), fields(owner_id = %owner_id))]
    pub async fn execute_with_cancel(
        &self,
        owner_id: Uuid,
        nodes: &[Node],
        edges: &[Edge],
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();

        let entry = nodes
            .iter()
            .find(|n| n.kind == NodeKind::QueryIntake)
            .ok_or(EngineError::MissingEntryPoint)?;

        let graph = ExecutionGraph::build(nodes, edges);
        let mut ctx = ExecutionContext::from_input(input)
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        let env = NodeEnv {
            run_id,
            owner_id,
            providers: &self.providers,
            clock: self.clock.as_ref(),
            step_timeout: self.config.step_timeout,
        };

        info!(%run_id, "starting run at node '{}' ({} nodes)", entry.id, graph.len());

        let mut visited: HashSet<&str> = HashSet::new();
        let mut path: Vec<String> = Vec::new();

        let mut current = entry;
        ctx = self.step(current, ctx, &env, cancel).await?;
        visited.insert(current.id.as_str());
        path.push(current.id.clone());

        // Follow the first unvisited successor; stop at a sink or when every
        // successor has already run.
        while let Some(next) = graph
            .outbound(&current.id)
            .iter()
            .find(|id| !visited.contains(**id))
            .and_then(|id| graph.get(id))
        {
            current = next.node;
            ctx = self.step(current, ctx, &env, cancel).await?;
            visited.insert(current.id.as_str());
            path.push(current.id.clone());
        }

        let elapsed = started.elapsed();
        info!(
            %run_id,
            degraded = ctx.is_degraded(),
            "run completed after {} nodes in {:?}",
            path.len(),
            elapsed
        );

        Ok(RunReport {
            run_id,
            context: ctx,
            visited: path,
            elapsed,
        })
    }

    // -----------------------------------------------------------------------
    // Internal: execute a single node, racing cancellation.
    // -----------------------------------------------------------------------

    async fn step(
        &self,
        node: &Node,
        ctx: ExecutionContext,
        env: &NodeEnv<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionContext, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        debug!(run_id = %env.run_id, "executing node '{}' ({})", node.id, node.kind);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            result = Self::dispatch(node, ctx, env) => result,
        };

        if let Err(e) = &result {
            error!(run_id = %env.run_id, "node '{}' failed: {}", node.id, e);
        }
        result
    }

    async fn dispatch(
        node: &Node,
        ctx: ExecutionContext,
        env: &NodeEnv<'_>,
    ) -> Result<ExecutionContext, EngineError> {
        let (config, warnings) = decode_config_lenient(node);
        let ctx = if warnings.is_empty() {
            ctx
        } else {
            for warning in &warnings {
                warn!(run_id = %env.run_id, "node '{}': {}", node.id, warning);
            }
            ctx.with_warnings(warnings.into_iter().map(|w| format!("node '{}': {w}", node.id)))
        };

        let result = match config {
            NodeConfig::QueryIntake(config) => query_intake::run(&config, ctx, env).await,
            NodeConfig::KnowledgeRetrieval(config) => {
                knowledge_retrieval::run(&config, ctx, env).await
            }
            NodeConfig::Generation(config) => generation::run(&config, ctx, env).await,
            NodeConfig::OutputFormat(config) => output_format::run(&config, ctx, env).await,
        };
        result.map_err(|e| EngineError::from_node(&node.id, e))
    }
}
