//! Adjacency structure used by the runner.

use std::collections::HashMap;

use crate::models::{Edge, Node};

/// A node plus the IDs of its neighbours, in edge order.
#[derive(Debug, Clone)]
pub struct GraphEntry<'a> {
    pub node: &'a Node,
    pub inbound: Vec<&'a str>,
    pub outbound: Vec<&'a str>,
}

/// Node ID → [`GraphEntry`], built fresh for every run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph<'a> {
    entries: HashMap<&'a str, GraphEntry<'a>>,
}

impl<'a> ExecutionGraph<'a> {
    /// Build the graph. Edges with a missing endpoint are dropped silently;
    /// validation is where those get reported.
    pub fn build(nodes: &'a [Node], edges: &'a [Edge]) -> Self {
        let mut entries: HashMap<&'a str, GraphEntry<'a>> = nodes
            .iter()
            .map(|node| {
                (
                    node.id.as_str(),
                    GraphEntry {
                        node,
                        inbound: Vec::new(),
                        outbound: Vec::new(),
                    },
                )
            })
            .collect();

        for edge in edges {
            let (source, target) = (edge.source.as_str(), edge.target.as_str());
            if !(entries.contains_key(source) && entries.contains_key(target)) {
                continue;
            }
            if let Some(entry) = entries.get_mut(source) {
                entry.outbound.push(target);
            }
            if let Some(entry) = entries.get_mut(target) {
                entry.inbound.push(source);
            }
        }

        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&GraphEntry<'a>> {
        self.entries.get(id)
    }

    /// Successors of `id` in edge order; empty for unknown IDs.
    pub fn outbound(&self, id: &str) -> &[&'a str] {
        self.entries
            .get(id)
            .map(|entry| entry.outbound.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
