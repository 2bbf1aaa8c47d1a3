//! In-process graph store
//!
//! Holds nodes and relationships in memory and answers the high-level store
//! operations directly. Free-form queries only succeed when a response has
//! been registered for them, which makes the store usable both as an
//! embedded backend for ingestion and as a scripted backend in tests.

use super::extraction::{normalize_rel_type, ExtractedEntity};
use super::model::{GraphNode, GraphPath, GraphRelationship, GraphValue, NodeId, Record, RelId};
use super::store::{GraphStore, Neighborhood, PathMatch, QueryParams};
use crate::error::GraphError;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone)]
enum Canned {
    Rows(Vec<Record>),
    Failure { code: String, message: String },
}

#[derive(Debug, Default)]
struct MemoryState {
    nodes: IndexMap<NodeId, GraphNode>,
    relationships: Vec<GraphRelationship>,
    next_id: i64,
    responses: HashMap<String, Canned>,
    executed: Vec<String>,
    closed: bool,
}

impl MemoryState {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_named(&self, label: &str, name: &str) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| n.has_label(label) && n.name().as_deref() == Some(name))
            .map(|n| n.id)
    }
}

/// Graph store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    state: RwLock<MemoryState>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node and return its id
    pub fn add_node(&self, labels: &[&str], properties: Vec<(&str, GraphValue)>) -> NodeId {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let id = NodeId(state.allocate());
        let mut node = GraphNode::new(id);
        node.labels = labels.iter().map(|l| l.to_string()).collect();
        for (key, value) in properties {
            node.properties.insert(key.to_string(), value);
        }
        state.nodes.insert(id, node);
        id
    }

    /// Insert an `Entity` node with `name` and `type`
    pub fn add_entity(&self, name: &str, entity_type: &str) -> NodeId {
        self.add_node(
            &["Entity"],
            vec![("name", GraphValue::from(name)), ("type", GraphValue::from(entity_type))],
        )
    }

    /// Insert a relationship between two existing nodes
    pub fn add_relationship(&self, start: NodeId, end: NodeId, rel_type: &str) -> RelId {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let id = RelId(state.allocate());
        state
            .relationships
            .push(GraphRelationship::new(id, start, end, rel_type));
        id
    }

    /// Answer `query` with `rows`
    pub fn respond_to(&self, query: &str, rows: Vec<Record>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .responses
            .insert(query.trim().to_string(), Canned::Rows(rows));
    }

    /// Fail `query` (and `EXPLAIN` of it) with a store error
    pub fn fail_on(&self, query: &str, code: &str, message: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.responses.insert(
            query.trim().to_string(),
            Canned::Failure {
                code: code.to_string(),
                message: message.to_string(),
            },
        );
    }

    /// Every query passed to `execute`, in order
    pub fn executed_queries(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .executed
            .clone()
    }

    pub fn node_count(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .relationships
            .len()
    }

    fn ensure_open(state: &MemoryState) -> Result<(), GraphError> {
        if state.closed {
            Err(GraphError::Closed)
        } else {
            Ok(())
        }
    }
}

fn strip_explain(query: &str) -> Option<&str> {
    let head = query.get(..8)?;
    if head.eq_ignore_ascii_case("EXPLAIN ") {
        Some(query[8..].trim())
    } else {
        None
    }
}

fn scalar_value(value: &Value) -> Option<GraphValue> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Some(GraphValue::from_json(value.clone())),
        _ => None,
    }
}

fn timestamp() -> GraphValue {
    GraphValue::Int(chrono::Utc::now().timestamp_millis())
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn execute(&self, query: &str, _params: QueryParams) -> Result<Vec<Record>, GraphError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_open(&state)?;

        let query = query.trim();
        state.executed.push(query.to_string());

        let (lookup, explain) = match strip_explain(query) {
            Some(inner) => (inner, true),
            None => (query, false),
        };

        match state.responses.get(lookup) {
            Some(Canned::Failure { code, message }) => Err(GraphError::query(code.clone(), message.clone())),
            Some(Canned::Rows(_)) if explain => Ok(Vec::new()),
            Some(Canned::Rows(rows)) => Ok(rows.clone()),
            None if explain => Ok(Vec::new()),
            None => Err(GraphError::Unsupported(query.to_string())),
        }
    }

    async fn labels(&self) -> Result<Vec<String>, GraphError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_open(&state)?;

        let mut seen = Vec::new();
        for label in state.nodes.values().flat_map(|n| n.labels.iter()) {
            if !seen.contains(label) {
                seen.push(label.clone());
            }
        }
        Ok(seen)
    }

    async fn relationship_types(&self) -> Result<Vec<String>, GraphError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_open(&state)?;

        let mut seen = Vec::new();
        for rel in &state.relationships {
            if !seen.contains(&rel.rel_type) {
                seen.push(rel.rel_type.clone());
            }
        }
        Ok(seen)
    }

    async fn search_nodes(
        &self,
        property: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, GraphError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_open(&state)?;

        Ok(state
            .nodes
            .values()
            .filter(|n| {
                n.property(property)
                    .and_then(GraphValue::as_str)
                    .map(|text| text.contains(value))
                    .unwrap_or(false)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn neighborhood(&self, ids: &[NodeId]) -> Result<Neighborhood, GraphError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_open(&state)?;

        let mut result = Neighborhood::default();
        let mut seen_connected = HashSet::new();
        let mut seen_rels = HashSet::new();

        for id in ids {
            let Some(node) = state.nodes.get(id) else { continue };
            if result.nodes.iter().any(|n| n.id == node.id) {
                continue;
            }
            result.nodes.push(node.clone());

            for rel in &state.relationships {
                let Some(other) = rel.other_node(*id) else { continue };
                if seen_rels.insert(rel.id) {
                    result.relationships.push(rel.clone());
                }
                if seen_connected.insert(other) {
                    if let Some(connected) = state.nodes.get(&other) {
                        result.connected.push(connected.clone());
                    }
                }
            }
        }

        Ok(result)
    }

    async fn shortest_path(
        &self,
        start_name: &str,
        end_name: &str,
        max_depth: usize,
    ) -> Result<Option<PathMatch>, GraphError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_open(&state)?;

        let (Some(start), Some(end)) = (
            state.find_named("Entity", start_name),
            state.find_named("Entity", end_name),
        ) else {
            return Ok(None);
        };
        if start == end {
            return Ok(None);
        }

        // Breadth-first over undirected edges, remembering how each node was reached
        let mut reached: HashMap<NodeId, (NodeId, usize)> = HashMap::new();
        let mut depth: HashMap<NodeId, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            let current_depth = depth[&current];
            if current == end || current_depth >= max_depth.max(1) {
                continue;
            }
            for (index, rel) in state.relationships.iter().enumerate() {
                let Some(next) = rel.other_node(current) else { continue };
                if depth.contains_key(&next) {
                    continue;
                }
                depth.insert(next, current_depth + 1);
                reached.insert(next, (current, index));
                queue.push_back(next);
            }
        }

        if !reached.contains_key(&end) {
            return Ok(None);
        }

        let mut node_ids = vec![end];
        let mut rel_indexes = Vec::new();
        let mut cursor = end;
        while let Some((previous, index)) = reached.get(&cursor) {
            rel_indexes.push(*index);
            node_ids.push(*previous);
            cursor = *previous;
        }
        node_ids.reverse();
        rel_indexes.reverse();

        let path = GraphPath {
            nodes: node_ids
                .iter()
                .filter_map(|id| state.nodes.get(id).cloned())
                .collect(),
            relationships: rel_indexes
                .iter()
                .map(|i| state.relationships[*i].clone())
                .collect(),
        };
        let length = path.len();
        Ok(Some(PathMatch { path, length }))
    }

    async fn merge_document(&self, name: &str) -> Result<NodeId, GraphError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_open(&state)?;

        if let Some(id) = state.find_named("Document", name) {
            return Ok(id);
        }

        let id = NodeId(state.allocate());
        let node = GraphNode::new(id)
            .with_label("Document")
            .with_property("name", name)
            .with_property("created_at", timestamp());
        state.nodes.insert(id, node);
        Ok(id)
    }

    async fn merge_entity(
        &self,
        entity: &ExtractedEntity,
        document: Option<NodeId>,
    ) -> Result<NodeId, GraphError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_open(&state)?;

        let id = match state.find_named("Entity", &entity.name) {
            Some(id) => id,
            None => {
                let id = NodeId(state.allocate());
                let node = GraphNode::new(id)
                    .with_label("Entity")
                    .with_property("name", entity.name.as_str())
                    .with_property("created_at", timestamp());
                state.nodes.insert(id, node);
                id
            }
        };

        if let Some(node) = state.nodes.get_mut(&id) {
            node.properties
                .insert("type".to_string(), GraphValue::from(entity.entity_type.as_str()));
            for (key, value) in &entity.properties {
                if let Some(value) = scalar_value(value) {
                    node.properties.insert(key.clone(), value);
                }
            }
        }

        if let Some(doc_id) = document {
            let linked = state
                .relationships
                .iter()
                .any(|r| r.start == id && r.end == doc_id && r.rel_type == "EXTRACTED_FROM");
            if !linked && state.nodes.contains_key(&doc_id) {
                let rel_id = RelId(state.allocate());
                state
                    .relationships
                    .push(GraphRelationship::new(rel_id, id, doc_id, "EXTRACTED_FROM"));
            }
        }

        Ok(id)
    }

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

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_open(&state)?;

        let (Some(start), Some(end)) = (
            state.find_named("Entity", source),
            state.find_named("Entity", target),
        ) else {
            return Ok(None);
        };

        let props: HashMap<String, GraphValue> = properties
            .iter()
            .filter_map(|(k, v)| scalar_value(v).map(|v| (k.clone(), v)))
            .collect();

        let existing = state.relationships.iter().find(|r| {
            r.start == start
                && r.end == end
                && r.rel_type == rel_type
                && props.iter().all(|(k, v)| r.properties.get(k) == Some(v))
        });
        if let Some(rel) = existing {
            return Ok(Some(rel.id));
        }

        let id = RelId(state.allocate());
        let mut rel = GraphRelationship::new(id, start, end, rel_type);
        rel.properties = props;
        rel.properties.insert("created_at".to_string(), timestamp());
        state.relationships.push(rel);
        Ok(Some(id))
    }

    async fn close(&self) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ownership_graph() -> (MemoryGraphStore, NodeId, NodeId) {
        let store = MemoryGraphStore::new();
        let linkedin = store.add_entity("LinkedIn", "Organization");
        let microsoft = store.add_entity("Microsoft", "Organization");
        store.add_relationship(linkedin, microsoft, "OWNED_BY");
        (store, linkedin, microsoft)
    }

    #[tokio::test]
    async fn test_unregistered_query_is_unsupported() {
        let store = MemoryGraphStore::new();
        let result = store.execute("MATCH (n) RETURN n", QueryParams::new()).await;
        assert!(matches!(result, Err(GraphError::Unsupported(_))));
        assert_eq!(store.executed_queries().len(), 1);
    }

    #[tokio::test]
    async fn test_explain_follows_registered_failure() {
        let store = MemoryGraphStore::new();
        store.fail_on("MATC (n)", "Neo.ClientError.Statement.SyntaxError", "Invalid input");

        assert!(store.execute("EXPLAIN MATCH (n) RETURN n", QueryParams::new()).await.is_ok());
        assert!(store.execute("EXPLAIN MATC (n)", QueryParams::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_labels_and_types() {
        let (store, _, _) = ownership_graph();
        assert_eq!(store.labels().await.unwrap(), vec!["Entity"]);
        assert_eq!(store.relationship_types().await.unwrap(), vec!["OWNED_BY"]);
    }

    #[tokio::test]
    async fn test_neighborhood_one_hop() {
        let (store, linkedin, microsoft) = ownership_graph();
        let github = store.add_entity("GitHub", "Organization");
        store.add_relationship(github, microsoft, "OWNED_BY");

        let hood = store.neighborhood(&[linkedin]).await.unwrap();
        assert_eq!(hood.nodes.len(), 1);
        assert_eq!(hood.connected.len(), 1);
        assert_eq!(hood.connected[0].id, microsoft);
        assert_eq!(hood.relationships.len(), 1);
    }

    #[tokio::test]
    async fn test_shortest_path_respects_depth() {
        let (store, _, microsoft) = ownership_graph();
        let redmond = store.add_entity("Redmond", "Location");
        store.add_relationship(microsoft, redmond, "HEADQUARTERED_IN");

        let found = store.shortest_path("LinkedIn", "Redmond", 5).await.unwrap().unwrap();
        assert_eq!(found.length, 2);
        assert_eq!(found.path.nodes.len(), 3);
        assert_eq!(found.path.nodes[0].name().as_deref(), Some("LinkedIn"));

        assert!(store.shortest_path("LinkedIn", "Redmond", 1).await.unwrap().is_none());
        assert!(store.shortest_path("LinkedIn", "Nowhere", 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_entity_is_idempotent() {
        let store = MemoryGraphStore::new();
        let doc = store.merge_document("doc-1").await.unwrap();
        let entity: ExtractedEntity = serde_json::from_value(json!({
            "name": "Microsoft", "type": "Organization", "properties": {"founded": 1975}
        }))
        .unwrap();

        let first = store.merge_entity(&entity, Some(doc)).await.unwrap();
        let second = store.merge_entity(&entity, Some(doc)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.relationship_count(), 1);
    }

    #[tokio::test]
    async fn test_merge_relationship_missing_endpoint() {
        let (store, _, _) = ownership_graph();
        let id = store
            .merge_relationship("LinkedIn", "Nobody", "owned by", &serde_json::Map::new())
            .await
            .unwrap();
        assert!(id.is_none());

        let id = store
            .merge_relationship("Microsoft", "LinkedIn", "owns", &serde_json::Map::new())
            .await
            .unwrap();
        assert!(id.is_some());
        assert!(store.relationship_types().await.unwrap().contains(&"OWNS".to_string()));
    }

    #[tokio::test]
    async fn test_closed_store() {
        let store = MemoryGraphStore::new();
        store.close().await;
        assert!(matches!(store.labels().await, Err(GraphError::Closed)));
    }
}
