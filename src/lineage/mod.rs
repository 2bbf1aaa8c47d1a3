//! Lineage: the graph paths that justify an answer

use crate::graph::{properties_to_json, GraphPath, GraphStore, Subgraph};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Number of paths spelled out in a subgraph explanation
const EXPLAINED_PATHS: usize = 5;

/// One hop of a path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageStep {
    pub from: String,
    pub relationship: String,
    pub to: String,
}

/// A relationship of the subgraph rendered with endpoint names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineagePath {
    pub start: String,
    pub relationship: String,
    pub end: String,
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationNode {
    pub id: usize,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationEdge {
    pub source: String,
    pub target: String,
    pub label: String,
    pub properties: serde_json::Value,
}

/// Node and edge lists ready for a graph renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationData {
    pub nodes: Vec<VisualizationNode>,
    pub edges: Vec<VisualizationEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageMap {
    pub query: String,
    pub paths: Vec<LineagePath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<VisualizationData>,
    pub explanation: String,
    pub num_nodes: usize,
    pub num_relationships: usize,
}

/// Outcome of a shortest-path lookup between two named entities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_length: Option<usize>,
    #[serde(default)]
    pub lineage: Vec<LineageStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every relationship of the subgraph with its endpoints named
pub fn extract_paths(subgraph: &Subgraph) -> Vec<LineagePath> {
    subgraph
        .relationships()
        .iter()
        .map(|rel| LineagePath {
            start: subgraph.node_name(rel.start),
            relationship: rel.rel_type.clone(),
            end: subgraph.node_name(rel.end),
            properties: properties_to_json(&rel.properties),
        })
        .collect()
}

/// Numbered narrative of the first few paths
pub fn explain_subgraph(question: &str, paths: &[LineagePath]) -> String {
    if paths.is_empty() {
        return "No paths found in the knowledge graph.".to_string();
    }

    let mut explanation = format!(
        "To answer '{}', the system traversed the following paths:\n\n",
        question
    );
    for (i, path) in paths.iter().take(EXPLAINED_PATHS).enumerate() {
        explanation.push_str(&format!(
            "{}. {} → [{}] → {}\n",
            i + 1,
            path.start,
            path.relationship,
            path.end
        ));
    }
    if paths.len() > EXPLAINED_PATHS {
        explanation.push_str(&format!("\n... and {} more paths", paths.len() - EXPLAINED_PATHS));
    }

    explanation
}

pub fn visualization(subgraph: &Subgraph) -> VisualizationData {
    let nodes = subgraph
        .nodes()
        .iter()
        .enumerate()
        .map(|(i, node)| VisualizationNode {
            id: i,
            label: node.name().unwrap_or_else(|| format!("Node_{}", i)),
            node_type: node.entity_type().unwrap_or_else(|| "Entity".to_string()),
            properties: properties_to_json(&node.properties),
        })
        .collect();

    let edges = subgraph
        .relationships()
        .iter()
        .map(|rel| VisualizationEdge {
            source: subgraph.node_name(rel.start),
            target: subgraph.node_name(rel.end),
            label: rel.rel_type.clone(),
            properties: properties_to_json(&rel.properties),
        })
        .collect();

    VisualizationData { nodes, edges }
}

/// Paths, visualization data and explanation for a subgraph
pub fn lineage_map(question: &str, subgraph: &Subgraph) -> LineageMap {
    info!("Generating lineage map for query: {}", question);

    if subgraph.is_empty() {
        return LineageMap {
            query: question.to_string(),
            paths: Vec::new(),
            visualization: None,
            explanation: "No data available to generate lineage map".to_string(),
            num_nodes: 0,
            num_relationships: subgraph.relationships().len(),
        };
    }

    let paths = extract_paths(subgraph);
    let explanation = explain_subgraph(question, &paths);
    LineageMap {
        query: question.to_string(),
        visualization: Some(visualization(subgraph)),
        explanation,
        num_nodes: subgraph.nodes().len(),
        num_relationships: subgraph.relationships().len(),
        paths,
    }
}

/// Steps of a path in traversal order.
///
/// Assumes `path.nodes[i]` and `path.nodes[i + 1]` are the endpoints of
/// `path.relationships[i]`; unnamed or missing nodes render as `Node_<i>`.
pub fn path_steps(path: &GraphPath) -> Vec<LineageStep> {
    let name_at = |i: usize| {
        path.nodes
            .get(i)
            .and_then(|node| node.name())
            .unwrap_or_else(|| format!("Node_{}", i))
    };

    path.relationships
        .iter()
        .enumerate()
        .map(|(i, rel)| LineageStep {
            from: name_at(i),
            relationship: rel.rel_type.clone(),
            to: name_at(i + 1),
        })
        .collect()
}

/// `"Path: A →[R]→ B →[R2]→ C"`, each node named once
pub fn explain_path(steps: &[LineageStep]) -> String {
    let Some(first) = steps.first() else {
        return "No path information available".to_string();
    };

    let mut explanation = format!("Path: {}", first.from);
    for step in steps {
        explanation.push_str(&format!(" →[{}]→ {}", step.relationship, step.to));
    }
    explanation
}

/// Finds and explains paths between named entities
pub struct LineageReconstructor {
    store: Arc<dyn GraphStore>,
}

impl LineageReconstructor {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn shortest_path(&self, start: &str, end: &str, max_depth: usize) -> PathResult {
        info!("Finding path from {} to {}", start, end);

        match self.store.shortest_path(start, end, max_depth).await {
            Ok(Some(found)) => {
                let lineage = path_steps(&found.path);
                PathResult {
                    found: true,
                    start_entity: Some(start.to_string()),
                    end_entity: Some(end.to_string()),
                    path_length: Some(found.length),
                    explanation: Some(explain_path(&lineage)),
                    lineage,
                    ..PathResult::default()
                }
            }
            Ok(None) => PathResult {
                found: false,
                message: Some(format!("No path found between {} and {}", start, end)),
                ..PathResult::default()
            },
            Err(e) => {
                error!("Error finding path: {}", e);
                PathResult {
                    found: false,
                    error: Some(e.to_string()),
                    ..PathResult::default()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphNode, GraphRelationship, MemoryGraphStore, NodeId, RelId};

    fn path(from: &str, to: &str) -> LineagePath {
        LineagePath {
            start: from.to_string(),
            relationship: "OWNS".to_string(),
            end: to.to_string(),
            properties: serde_json::json!({}),
        }
    }

    #[test]
    fn test_explain_subgraph_empty() {
        assert_eq!(explain_subgraph("q", &[]), "No paths found in the knowledge graph.");
    }

    #[test]
    fn test_explain_subgraph_truncates_to_five() {
        let paths: Vec<LineagePath> = (0..7).map(|i| path(&format!("A{}", i), "B")).collect();
        let text = explain_subgraph("Who owns B?", &paths);

        assert!(text.starts_with("To answer 'Who owns B?', the system traversed the following paths:\n\n"));
        assert!(text.contains("1. A0 → [OWNS] → B\n"));
        assert!(text.contains("5. A4 → [OWNS] → B\n"));
        assert!(!text.contains("A5"));
        assert!(text.ends_with("\n... and 2 more paths"));
    }

    #[test]
    fn test_path_steps_and_explanation() {
        let graph_path = GraphPath {
            nodes: vec![
                GraphNode::new(NodeId(1)).with_property("name", "LinkedIn"),
                GraphNode::new(NodeId(2)).with_property("name", "Microsoft"),
                GraphNode::new(NodeId(3)),
            ],
            relationships: vec![
                GraphRelationship::new(RelId(1), NodeId(1), NodeId(2), "OWNED_BY"),
                GraphRelationship::new(RelId(2), NodeId(2), NodeId(3), "LOCATED_IN"),
            ],
        };

        let steps = path_steps(&graph_path);
        assert_eq!(steps[1].to, "Node_2");
        assert_eq!(
            explain_path(&steps),
            "Path: LinkedIn →[OWNED_BY]→ Microsoft →[LOCATED_IN]→ Node_2"
        );
        assert_eq!(explain_path(&[]), "No path information available");
    }

    #[test]
    fn test_explain_path_names_each_node_once() {
        let steps = vec![
            LineageStep {
                from: "A".to_string(),
                relationship: "REL".to_string(),
                to: "B".to_string(),
            },
            LineageStep {
                from: "B".to_string(),
                relationship: "REL2".to_string(),
                to: "C".to_string(),
            },
        ];

        assert_eq!(explain_path(&steps), "Path: A →[REL]→ B →[REL2]→ C");
    }

    #[test]
    fn test_lineage_map_empty_subgraph() {
        let map = lineage_map("q", &Subgraph::new("q", vec![]));
        assert!(map.visualization.is_none());
        assert_eq!(map.explanation, "No data available to generate lineage map");
    }

    #[test]
    fn test_visualization_defaults() {
        let mut subgraph = Subgraph::new("q", vec![]);
        subgraph.add_node(GraphNode::new(NodeId(4)));
        subgraph.add_node(
            GraphNode::new(NodeId(5))
                .with_property("name", "Microsoft")
                .with_property("type", "Organization"),
        );
        subgraph.add_relationship(GraphRelationship::new(RelId(1), NodeId(5), NodeId(9), "OWNS"));

        let viz = visualization(&subgraph);
        assert_eq!(viz.nodes[0].label, "Node_0");
        assert_eq!(viz.nodes[0].node_type, "Entity");
        assert_eq!(viz.nodes[1].label, "Microsoft");
        assert_eq!(viz.edges[0].source, "Microsoft");
        assert_eq!(viz.edges[0].target, "Unknown");
    }

    #[tokio::test]
    async fn test_shortest_path_not_found() {
        let store = Arc::new(MemoryGraphStore::new());
        store.add_entity("X", "Thing");
        let result = LineageReconstructor::new(store).shortest_path("X", "Y", 5).await;

        assert!(!result.found);
        assert_eq!(result.message.as_deref(), Some("No path found between X and Y"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_shortest_path_store_error() {
        let store = Arc::new(MemoryGraphStore::new());
        store.close().await;
        let result = LineageReconstructor::new(store).shortest_path("X", "Y", 5).await;

        assert!(!result.found);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_shortest_path_found() {
        let store = Arc::new(MemoryGraphStore::new());
        let linkedin = store.add_entity("LinkedIn", "Organization");
        let microsoft = store.add_entity("Microsoft", "Organization");
        store.add_relationship(linkedin, microsoft, "OWNED_BY");

        let result = LineageReconstructor::new(store)
            .shortest_path("LinkedIn", "Microsoft", 5)
            .await;

        assert!(result.found);
        assert_eq!(result.path_length, Some(1));
        assert_eq!(result.explanation.as_deref(), Some("Path: LinkedIn →[OWNED_BY]→ Microsoft"));
    }
}
