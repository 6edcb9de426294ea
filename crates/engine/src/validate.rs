//! Structural validation. Run this before persisting or executing a
//! workflow.
//!
//! Errors (the graph is rejected):
//! 1. There must be a `query_intake` node (the entry point).
//! 2. There must be an `output_format` node (the exit point).
//! 3. Node IDs must be unique within the workflow.
//! 4. Every node's config must decode, and carry its kind's required fields.
//! 5. Every edge must reference existing node IDs (both `source` and `target`).
//!
//! Warnings (the graph is accepted):
//! - more than one `query_intake` node (only the first is used);
//! - a node with several outgoing edges (only the first unvisited one is
//!   followed at run time).
//!
//! Cycles and unreachable nodes are not checked; the runner's visited set
//! keeps cyclic graphs finite.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::executor::decode_config;
use crate::models::{Edge, Node, NodeKind, Workflow};
use crate::EngineError;

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Turn a failed validation into [`EngineError::Invalid`].
    pub fn into_result(self) -> Result<Vec<String>, EngineError> {
        if self.valid {
            Ok(self.warnings)
        } else {
            Err(EngineError::Invalid(self.errors))
        }
    }
}

/// Validate a node/edge list. Pure; never fails.
pub fn validate(nodes: &[Node], edges: &[Edge]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // -----------------------------------------------------------------------
    // 1–2. Entry and exit points
    // -----------------------------------------------------------------------
    let entries = nodes.iter().filter(|n| n.kind == NodeKind::QueryIntake).count();
    if entries == 0 {
        errors.push("workflow must include a query_intake node (entry point)".to_owned());
    } else if entries > 1 {
        warnings.push(format!(
            "workflow has {entries} query_intake nodes; only the first is used as the entry point"
        ));
    }

    if !nodes.iter().any(|n| n.kind == NodeKind::OutputFormat) {
        errors.push("workflow must include an output_format node (exit point)".to_owned());
    }

    // -----------------------------------------------------------------------
    // 3–4. Node IDs and configs
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in nodes {
        if !seen_ids.insert(node.id.as_str()) {
            errors.push(format!("duplicate node ID: '{}'", node.id));
        }

        if let Err(e) = decode_config(node) {
            errors.push(e.to_string());
        }

        for field in node.kind.required_fields() {
            if node.config.get(field).is_none() {
                errors.push(format!(
                    "{} node '{}' missing required field: {field}",
                    node.kind, node.id
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // 5. Edge endpoints
    // -----------------------------------------------------------------------
    let mut outgoing: HashMap<&str, usize> = HashMap::new();
    for edge in edges {
        if !seen_ids.contains(edge.source.as_str()) {
            errors.push(format!(
                "edge references non-existent source node: {}",
                edge.source
            ));
        }
        if !seen_ids.contains(edge.target.as_str()) {
            errors.push(format!(
                "edge references non-existent target node: {}",
                edge.target
            ));
        }
        *outgoing.entry(edge.source.as_str()).or_insert(0) += 1;
    }

    // Report in node order so the output is stable.
    for node in nodes {
        if let Some(&count) = outgoing.get(node.id.as_str()) {
            if count > 1 {
                warnings.push(format!(
                    "node '{}' has {count} outgoing edges; only the first unvisited target runs",
                    node.id
                ));
            }
        }
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// [`validate`] over a whole [`Workflow`].
pub fn validate_workflow(workflow: &Workflow) -> ValidationResult {
    validate(&workflow.nodes, &workflow.edges)
}
