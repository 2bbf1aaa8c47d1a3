//! Tagged property-graph model
//!
//! Everything a store returns is decoded into these types once, at the
//! adapter boundary. Downstream components match on [`GraphValue`] instead of
//! sniffing the shape of loosely typed records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name rendered for nodes that cannot be resolved
pub const UNKNOWN_NAME: &str = "Unknown";

/// Store-assigned node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned relationship identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelId(pub i64);

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Property bag on nodes and relationships
pub type PropertyMap = HashMap<String, GraphValue>;

/// One result row: column name -> value, in column order
pub type Record = IndexMap<String, GraphValue>;

/// A node as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl GraphNode {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: Vec::new(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn property(&self, key: &str) -> Option<&GraphValue> {
        self.properties.get(key)
    }

    /// The `name` property rendered as text
    pub fn name(&self) -> Option<String> {
        self.property("name").and_then(GraphValue::as_text)
    }

    /// The `type` property rendered as text
    pub fn entity_type(&self) -> Option<String> {
        self.property("type").and_then(GraphValue::as_text)
    }
}

/// A directed, typed relationship as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub id: RelId,
    pub rel_type: String,
    pub start: NodeId,
    pub end: NodeId,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl GraphRelationship {
    pub fn new(id: RelId, start: NodeId, end: NodeId, rel_type: impl Into<String>) -> Self {
        Self {
            id,
            rel_type: rel_type.into(),
            start,
            end,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The endpoint opposite to `from`, if `from` is an endpoint at all
    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.start {
            Some(self.end)
        } else if from == self.end {
            Some(self.start)
        } else {
            None
        }
    }
}

/// Alternating node/relationship sequence.
///
/// `nodes` holds one more element than `relationships` for a well-formed
/// path; consumers tolerate shorter node lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphPath {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

impl GraphPath {
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}

/// Any value a store record can hold.
///
/// Serializes as plain JSON (see [`GraphValue::to_json`]); deserializing goes
/// through [`GraphValue::from_json`], so graph entities come back as maps.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<GraphValue>),
    Map(HashMap<String, GraphValue>),
    Node(Box<GraphNode>),
    Relationship(Box<GraphRelationship>),
    Path(Box<GraphPath>),
}

impl GraphValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GraphValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            GraphValue::Int(i) => Some(*i),
            GraphValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[GraphValue]> {
        match self {
            GraphValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&GraphNode> {
        match self {
            GraphValue::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&GraphRelationship> {
        match self {
            GraphValue::Relationship(rel) => Some(rel),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&GraphPath> {
        match self {
            GraphValue::Path(path) => Some(path),
            _ => None,
        }
    }

    /// Scalar rendered as display text; `None` for null and containers
    pub fn as_text(&self) -> Option<String> {
        match self {
            GraphValue::String(s) => Some(s.clone()),
            GraphValue::Int(i) => Some(i.to_string()),
            GraphValue::Float(f) => Some(f.to_string()),
            GraphValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Resolve a display name from a bare string, a property map or a node.
    ///
    /// Anything else, or a map/node without a `name`, yields [`UNKNOWN_NAME`].
    pub fn display_name(&self) -> String {
        let resolved = match self {
            GraphValue::String(s) => Some(s.clone()),
            GraphValue::Map(map) => map.get("name").and_then(GraphValue::as_text),
            GraphValue::Node(node) => node.name(),
            _ => None,
        };
        resolved.unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }

    /// Convert plain JSON (no graph metadata) into a value
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => GraphValue::Null,
            Json::Bool(b) => GraphValue::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => GraphValue::Int(i),
                None => GraphValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => GraphValue::String(s),
            Json::Array(items) => GraphValue::List(items.into_iter().map(Self::from_json).collect()),
            Json::Object(map) => GraphValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Plain JSON rendering used for query parameters and API payloads
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            GraphValue::Null => Json::Null,
            GraphValue::Bool(b) => Json::Bool(*b),
            GraphValue::Int(i) => Json::from(*i),
            GraphValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            GraphValue::String(s) => Json::String(s.clone()),
            GraphValue::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            GraphValue::Map(map) => Json::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            GraphValue::Node(node) => serde_json::json!({
                "id": node.id.0,
                "labels": node.labels,
                "properties": properties_to_json(&node.properties),
            }),
            GraphValue::Relationship(rel) => serde_json::json!({
                "id": rel.id.0,
                "type": rel.rel_type,
                "start": rel.start.0,
                "end": rel.end.0,
                "properties": properties_to_json(&rel.properties),
            }),
            GraphValue::Path(path) => serde_json::json!({
                "nodes": path.nodes.iter()
                    .map(|n| GraphValue::Node(Box::new(n.clone())).to_json())
                    .collect::<Vec<_>>(),
                "relationships": path.relationships.iter()
                    .map(|r| GraphValue::Relationship(Box::new(r.clone())).to_json())
                    .collect::<Vec<_>>(),
            }),
        }
    }
}

impl Serialize for GraphValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GraphValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(GraphValue::from_json)
    }
}

/// Render a property bag as a JSON object
pub fn properties_to_json(properties: &PropertyMap) -> serde_json::Value {
    serde_json::Value::Object(
        properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

impl From<&str> for GraphValue {
    fn from(value: &str) -> Self {
        GraphValue::String(value.to_string())
    }
}

impl From<String> for GraphValue {
    fn from(value: String) -> Self {
        GraphValue::String(value)
    }
}

impl From<i64> for GraphValue {
    fn from(value: i64) -> Self {
        GraphValue::Int(value)
    }
}

impl From<f64> for GraphValue {
    fn from(value: f64) -> Self {
        GraphValue::Float(value)
    }
}

impl From<bool> for GraphValue {
    fn from(value: bool) -> Self {
        GraphValue::Bool(value)
    }
}

impl From<GraphNode> for GraphValue {
    fn from(value: GraphNode) -> Self {
        GraphValue::Node(Box::new(value))
    }
}

impl From<GraphRelationship> for GraphValue {
    fn from(value: GraphRelationship) -> Self {
        GraphValue::Relationship(Box::new(value))
    }
}

impl<T: Into<GraphValue>> From<Vec<T>> for GraphValue {
    fn from(values: Vec<T>) -> Self {
        GraphValue::List(values.into_iter().map(Into::into).collect())
    }
}
