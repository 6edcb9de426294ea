//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like
//! in memory.  They serialise to/from the JSON `definition` column of the
//! `workflows` table and the workflow files read by the CLI.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::EngineError;

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Entry point: captures the user's question.
    QueryIntake,
    /// Similarity search over the owner's document chunks.
    KnowledgeRetrieval,
    /// Language-model call.
    Generation,
    /// Renders the final answer.
    OutputFormat,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        Self::QueryIntake,
        Self::KnowledgeRetrieval,
        Self::Generation,
        Self::OutputFormat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::QueryIntake => "query_intake",
            Self::KnowledgeRetrieval => "knowledge_retrieval",
            Self::Generation => "generation",
            Self::OutputFormat => "output_format",
        }
    }

    /// Config keys that must be present for this kind. Empty for every kind
    /// today.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::QueryIntake
            | Self::KnowledgeRetrieval
            | Self::Generation
            | Self::OutputFormat => &[],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EngineError::UnknownNodeKind(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Wire shape of a node, before its kind is checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
}

/// A single step in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    pub kind: NodeKind,
    /// Kind-specific options, decoded by the node's handler.
    pub config: Value,
    /// Editor layout; carried through untouched.
    pub position: Option<Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            config: Value::Null,
            position: None,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}

impl TryFrom<RawNode> for Node {
    type Error = EngineError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: raw.kind.parse()?,
            id: raw.id,
            config: raw.config,
            position: raw.position,
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            kind: node.kind.as_str().to_owned(),
            config: node.config,
            position: node.position,
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Convenience constructor for testing.
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            nodes,
            edges,
            created_at: Utc::now(),
        }
    }

    /// Parse a workflow from its JSON form.
    ///
    /// # Errors
    /// [`EngineError::UnknownNodeKind`] when a node names a kind outside the
    /// closed set, [`EngineError::InvalidDefinition`] for any other shape
    /// problem.
    pub fn from_json(value: Value) -> Result<Self, EngineError> {
        #[derive(Deserialize)]
        struct RawWorkflow {
            #[serde(default = "Uuid::new_v4")]
            id: Uuid,
            name: String,
            #[serde(default)]
            description: Option<String>,
            nodes: Vec<RawNode>,
            #[serde(default)]
            edges: Vec<Edge>,
            #[serde(default = "Utc::now")]
            created_at: DateTime<Utc>,
        }

        let raw: RawWorkflow = serde_json::from_value(value)
            .map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;
        let nodes = raw
            .nodes
            .into_iter()
            .map(Node::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            nodes,
            edges: raw.edges,
            created_at: raw.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_round_trips_through_its_wire_name() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Workflow::from_json(json!({
            "name": "bad",
            "nodes": [{ "id": "1", "kind": "web_search" }],
        }))
        .unwrap_err();
        assert!(matches!(err, EngineError::UnknownNodeKind(kind) if kind == "web_search"));
    }

    #[test]
    fn parses_editor_payload_and_keeps_position() {
        let wf = Workflow::from_json(json!({
            "name": "qa",
            "nodes": [
                { "id": "1", "kind": "query_intake", "position": { "x": 10.0, "y": 20.0 } },
                { "id": "2", "kind": "output_format", "config": { "format": "json" } }
            ],
            "edges": [{ "id": "e1", "source": "1", "target": "2" }]
        }))
        .unwrap();

        assert_eq!(wf.nodes[0].kind, NodeKind::QueryIntake);
        assert_eq!(wf.nodes[0].position, Some(json!({ "x": 10.0, "y": 20.0 })));
        assert_eq!(wf.nodes[1].config["format"], "json");
        assert_eq!(wf.edges[0].id.as_deref(), Some("e1"));

        let back = serde_json::to_value(&wf.nodes[1]).unwrap();
        assert_eq!(back["kind"], "output_format");
    }

    #[test]
    fn node_deserialize_goes_through_kind_check() {
        let err = serde_json::from_value::<Node>(json!({ "id": "x", "kind": "Loop" })).unwrap_err();
        assert!(err.to_string().contains("unknown node kind 'Loop'"));
    }
}
