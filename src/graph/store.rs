//! Graph store capability
//!
//! `execute` is the only required method. Everything else has a Cypher-based
//! default built on top of it, so a Cypher-speaking adapter only has to ship
//! queries; embedded stores override the higher-level methods directly.

use super::extraction::{is_safe_identifier, normalize_rel_type, ExtractedEntity};
use super::model::{GraphNode, GraphPath, GraphRelationship, GraphValue, NodeId, Record, RelId};
use crate::error::GraphError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Query parameters, passed to the store as a JSON object
pub type QueryParams = serde_json::Map<String, Value>;

/// Seed nodes plus everything one relationship hop away
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    pub nodes: Vec<GraphNode>,
    pub connected: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

/// A shortest path together with its reported length
#[derive(Debug, Clone)]
pub struct PathMatch {
    pub path: GraphPath,
    pub length: usize,
}

/// Build a parameter map from `(name, value)` pairs
pub fn params<I, K>(pairs: I) -> QueryParams
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Labeled property graph store
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute a query and return its rows
    async fn execute(&self, query: &str, params: QueryParams) -> Result<Vec<Record>, GraphError>;

    /// Node labels currently in use
    async fn labels(&self) -> Result<Vec<String>, GraphError> {
        let rows = self
            .execute(
                "CALL db.labels() YIELD label RETURN collect(label) AS labels",
                QueryParams::new(),
            )
            .await?;
        Ok(string_column(&rows, "labels"))
    }

    /// Relationship types currently in use
    async fn relationship_types(&self) -> Result<Vec<String>, GraphError> {
        let rows = self
            .execute(
                "CALL db.relationshipTypes() YIELD relationshipType \
                 RETURN collect(relationshipType) AS relationships",
                QueryParams::new(),
            )
            .await?;
        Ok(string_column(&rows, "relationships"))
    }

    /// Nodes whose `property` contains `value`
    async fn search_nodes(
        &self,
        property: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, GraphError> {
        if !is_safe_identifier(property) {
            return Err(GraphError::Unsupported(format!("invalid property name: {}", property)));
        }

        let query = format!(
            "MATCH (n) WHERE n.{} CONTAINS $value RETURN n LIMIT $limit",
            property
        );
        let rows = self
            .execute(&query, params([("value", json!(value)), ("limit", json!(limit))]))
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("n").and_then(GraphValue::as_node).cloned())
            .collect())
    }

    /// Seed nodes, their one-hop neighbors and the connecting relationships
    async fn neighborhood(&self, ids: &[NodeId]) -> Result<Neighborhood, GraphError> {
        let node_ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = self
            .execute(
                "MATCH (n) WHERE id(n) IN $node_ids \
                 OPTIONAL MATCH (n)-[r]-(connected) \
                 RETURN collect(DISTINCT n) AS nodes, \
                        collect(DISTINCT connected) AS connected_nodes, \
                        collect(DISTINCT r) AS relationships",
                params([("node_ids", json!(node_ids))]),
            )
            .await?;

        let Some(row) = rows.first() else {
            return Ok(Neighborhood::default());
        };

        Ok(Neighborhood {
            nodes: list_of(row, "nodes", GraphValue::as_node),
            connected: list_of(row, "connected_nodes", GraphValue::as_node),
            relationships: list_of(row, "relationships", GraphValue::as_relationship),
        })
    }

    /// Shortest path of at most `max_depth` hops between two named entities
    async fn shortest_path(
        &self,
        start_name: &str,
        end_name: &str,
        max_depth: usize,
    ) -> Result<Option<PathMatch>, GraphError> {
        let query = format!(
            "MATCH (start:Entity {{name: $start_name}}) \
             MATCH (end:Entity {{name: $end_name}}) \
             MATCH path = shortestPath((start)-[*..{}]-(end)) \
             RETURN path, length(path) AS path_length",
            max_depth.max(1)
        );
        let rows = self
            .execute(
                &query,
                params([("start_name", json!(start_name)), ("end_name", json!(end_name))]),
            )
            .await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let path = row.get("path").and_then(GraphValue::as_path).cloned();
        Ok(path.map(|path| {
            let length = row
                .get("path_length")
                .and_then(GraphValue::as_int)
                .map(|l| l.max(0) as usize)
                .unwrap_or_else(|| path.len());
            PathMatch { path, length }
        }))
    }

    /// Merge a `Document` node by name and return its id
    async fn merge_document(&self, name: &str) -> Result<NodeId, GraphError> {
        let rows = self
            .execute(
                "MERGE (d:Document {name: $name}) \
                 ON CREATE SET d.created_at = timestamp() \
                 RETURN id(d) AS doc_id",
                params([("name", json!(name))]),
            )
            .await?;
        first_id(&rows, "doc_id").map(NodeId)
    }

    /// Merge an `Entity` node by name, optionally linking it to a document
    async fn merge_entity(
        &self,
        entity: &ExtractedEntity,
        document: Option<NodeId>,
    ) -> Result<NodeId, GraphError> {
        let mut query = String::from(
            "MERGE (e:Entity {name: $name}) \
             ON CREATE SET e.type = $type, e.created_at = timestamp() \
             ON MATCH SET e.type = $type ",
        );
        let mut query_params = params([
            ("name", json!(entity.name)),
            ("type", json!(entity.entity_type)),
        ]);

        for (key, value) in &entity.properties {
            if is_safe_identifier(key) && is_scalar(value) {
                query.push_str(&format!("SET e.{key} = $prop_{key} "));
                query_params.insert(format!("prop_{key}"), value.clone());
            }
        }

        if let Some(doc_id) = document {
            query.push_str(
                "WITH e MATCH (d:Document) WHERE id(d) = $doc_id \
                 MERGE (e)-[:EXTRACTED_FROM]->(d) ",
            );
            query_params.insert("doc_id".to_string(), json!(doc_id.0));
        }
        query.push_str("RETURN id(e) AS entity_id");

        let rows = self.execute(&query, query_params).await?;
        first_id(&rows, "entity_id").map(NodeId)
    }

    /// Merge a typed relationship between two entities named by `source` and `target`.
    ///
    /// Returns `None` when either endpoint does not exist.
    async fn merge_relationship(
        &self,
        source: &str,
        target: &str,
        rel_type: &str,
        properties: &serde_json::Map<String, Value>,
    ) -> Result<Option<RelId>, GraphError> {
        let rel_type = normalize_rel_type(rel_type);
        if rel_type.is_empty() {
            return Err(GraphError::Unsupported("empty relationship type".to_string()));
        }

        let mut query_params = params([
            ("source_name", json!(source)),
            ("target_name", json!(target)),
        ]);
        let mut prop_parts = Vec::new();
        for (key, value) in properties {
            if is_safe_identifier(key) && is_scalar(value) {
                prop_parts.push(format!("{key}: $prop_{key}"));
                query_params.insert(format!("prop_{key}"), value.clone());
            }
        }
        let rel_props = if prop_parts.is_empty() {
            String::new()
        } else {
            format!(" {{{}}}", prop_parts.join(", "))
        };

        let query = format!(
            "MATCH (source:Entity {{name: $source_name}}) \
             MATCH (target:Entity {{name: $target_name}}) \
             MERGE (source)-[r:{rel_type}{rel_props}]->(target) \
             ON CREATE SET r.created_at = timestamp() \
             RETURN id(r) AS rel_id"
        );

        let rows = self.execute(&query, query_params).await?;
        Ok(first_id(&rows, "rel_id").ok().map(RelId))
    }

    /// Release the underlying connection; later calls fail with [`GraphError::Closed`]
    async fn close(&self) {}
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn string_column(rows: &[Record], column: &str) -> Vec<String> {
    rows.first()
        .and_then(|row| row.get(column))
        .and_then(GraphValue::as_list)
        .map(|items| items.iter().filter_map(GraphValue::as_text).collect())
        .unwrap_or_default()
}

fn list_of<T: Clone>(
    row: &Record,
    column: &str,
    pick: impl Fn(&GraphValue) -> Option<&T>,
) -> Vec<T> {
    row.get(column)
        .and_then(GraphValue::as_list)
        .map(|items| items.iter().filter_map(|v| pick(v).cloned()).collect())
        .unwrap_or_default()
}

fn first_id(rows: &[Record], column: &str) -> Result<i64, GraphError> {
    rows.first()
        .and_then(|row| row.get(column))
        .and_then(GraphValue::as_int)
        .ok_or_else(|| GraphError::InvalidResponse(format!("missing column {}", column)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every query and answers from a fixed row set
    struct RecordingStore {
        rows: Vec<Record>,
        queries: Mutex<Vec<(String, QueryParams)>>,
    }

    impl RecordingStore {
        fn new(rows: Vec<Record>) -> Self {
            Self {
                rows,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> (String, QueryParams) {
            self.queries.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl GraphStore for RecordingStore {
        async fn execute(&self, query: &str, params: QueryParams) -> Result<Vec<Record>, GraphError> {
            self.queries.lock().unwrap().push((query.to_string(), params));
            Ok(self.rows.clone())
        }
    }

    fn row(pairs: Vec<(&str, GraphValue)>) -> Record {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[tokio::test]
    async fn test_labels_from_collected_column() {
        let store = RecordingStore::new(vec![row(vec![(
            "labels",
            GraphValue::from(vec!["Entity", "Document"]),
        )])]);

        let labels = store.labels().await.unwrap();
        assert_eq!(labels, vec!["Entity", "Document"]);
        assert!(store.last().0.contains("db.labels()"));
    }

    #[tokio::test]
    async fn test_search_nodes_rejects_unsafe_property() {
        let store = RecordingStore::new(vec![]);
        let result = store.search_nodes("name) DELETE n //", "x", 5).await;
        assert!(matches!(result, Err(GraphError::Unsupported(_))));
        assert!(store.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_nodes_picks_node_column() {
        let node = GraphNode::new(NodeId(3)).with_property("name", "Microsoft");
        let store = RecordingStore::new(vec![row(vec![("n", GraphValue::from(node))])]);

        let nodes = store.search_nodes("name", "Micro", 5).await.unwrap();
        assert_eq!(nodes.len(), 1);

        let (query, params) = store.last();
        assert!(query.contains("n.name CONTAINS $value"));
        assert_eq!(params["limit"], json!(5));
    }

    #[tokio::test]
    async fn test_shortest_path_empty_result_is_none() {
        let store = RecordingStore::new(vec![]);
        let path = store.shortest_path("X", "Y", 5).await.unwrap();
        assert!(path.is_none());
        assert!(store.last().0.contains("[*..5]"));
    }

    #[tokio::test]
    async fn test_merge_relationship_skips_unsafe_properties() {
        let store = RecordingStore::new(vec![row(vec![("rel_id", GraphValue::Int(11))])]);
        let mut props = serde_json::Map::new();
        props.insert("since".to_string(), json!(2016));
        props.insert("bad key".to_string(), json!("x"));
        props.insert("nested".to_string(), json!({"a": 1}));

        let id = store
            .merge_relationship("Microsoft", "LinkedIn", "owns", &props)
            .await
            .unwrap();

        assert_eq!(id, Some(RelId(11)));
        let (query, params) = store.last();
        assert!(query.contains("[r:OWNS {since: $prop_since}]"));
        assert!(!params.contains_key("prop_nested"));
    }
}
