//! Working subgraph retrieved around seed entities

use super::model::{GraphNode, GraphRelationship, NodeId, UNKNOWN_NAME};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Nodes and relationships retrieved for one question.
///
/// Nodes are unique by id and kept in insertion order. Relationships may point
/// at nodes that are not in the node set; such endpoints resolve to
/// [`UNKNOWN_NAME`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    nodes: Vec<GraphNode>,
    relationships: Vec<GraphRelationship>,
    /// Entity names that seeded the retrieval
    pub entities: Vec<String>,
    /// The question text
    pub query: String,
}

impl Subgraph {
    pub fn new(query: impl Into<String>, entities: Vec<String>) -> Self {
        Self {
            nodes: Vec::new(),
            relationships: Vec::new(),
            entities,
            query: query.into(),
        }
    }

    /// Insert a node unless one with the same id is already present
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.contains_node(node.id) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    /// Insert a relationship unless one with the same id is already present
    pub fn add_relationship(&mut self, rel: GraphRelationship) -> bool {
        if self.relationships.iter().any(|r| r.id == rel.id) {
            return false;
        }
        self.relationships.push(rel);
        true
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn relationships(&self) -> &[GraphRelationship] {
        &self.relationships
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Keep the first `cap` nodes; relationships are left untouched
    pub fn truncate_nodes(&mut self, cap: usize) {
        self.nodes.truncate(cap);
    }

    /// id -> display name for every node in the set
    pub fn name_index(&self) -> HashMap<NodeId, String> {
        self.nodes
            .iter()
            .map(|n| (n.id, n.name().unwrap_or_else(|| UNKNOWN_NAME.to_string())))
            .collect()
    }

    /// Display name for a node id, [`UNKNOWN_NAME`] when absent
    pub fn node_name(&self, id: NodeId) -> String {
        self.node(id)
            .and_then(GraphNode::name)
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }
}
