//! Engine-level error types.

use nodes::NodeError;
use thiserror::Error;

/// Errors produced by the workflow engine (parsing, validation, execution).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    // ------ Definition errors ------

    /// The workflow JSON did not have the expected shape.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// A node names a kind outside the closed set.
    #[error("unknown node kind '{0}'")]
    UnknownNodeKind(String),

    /// Structural validation failed; nothing was executed.
    #[error("workflow validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),

    // ------ Execution errors ------

    /// The graph has no query intake node to start from.
    #[error("workflow has no query_intake node")]
    MissingEntryPoint,

    /// The caller's input could not be turned into an execution context.
    #[error("invalid run input: {0}")]
    InvalidInput(String),

    /// A node's config block could not be decoded.
    #[error("node '{node_id}' has invalid config: {message}")]
    InvalidNodeConfig { node_id: String, message: String },

    /// A node failed in a way it does not recover from; the run is aborted.
    #[error("node '{node_id}' failed: {source}")]
    NodeFailed {
        node_id: String,
        #[source]
        source: NodeError,
    },

    /// The run was cancelled by its caller.
    #[error("workflow execution cancelled")]
    Cancelled,
}

impl EngineError {
    /// Attribute a handler error to `node_id`.
    pub fn from_node(node_id: &str, err: NodeError) -> Self {
        match err {
            NodeError::InvalidConfig { message, .. } => Self::InvalidNodeConfig {
                node_id: node_id.to_owned(),
                message,
            },
            other => Self::NodeFailed {
                node_id: node_id.to_owned(),
                source: other,
            },
        }
    }
}
