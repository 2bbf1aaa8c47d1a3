//! Neo4j adapter over the HTTP transactional endpoint

use super::model::{GraphNode, GraphPath, GraphRelationship, GraphValue, NodeId, Record, RelId};
use super::store::{GraphStore, QueryParams};
use crate::config::GraphConfig;
use crate::error::GraphError;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Graph store backed by a Neo4j server.
///
/// The HTTP client is created on first use. After [`GraphStore::close`]
/// every call fails with [`GraphError::Closed`].
pub struct Neo4jHttpStore {
    config: GraphConfig,
    password: Option<SecretString>,
    client: OnceCell<Client>,
    closed: AtomicBool,
}

impl Neo4jHttpStore {
    pub fn new(config: GraphConfig) -> Self {
        let password = config.password.clone().map(SecretString::new);
        Self {
            config,
            password,
            client: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.config.uri.trim_end_matches('/'),
            self.config.database
        )
    }

    async fn client(&self) -> Result<&Client, GraphError> {
        self.client
            .get_or_try_init(|| async {
                debug!("Opening graph connection to {}", self.config.uri);
                Client::builder()
                    .timeout(self.config.timeout())
                    .build()
                    .map_err(|e| GraphError::Connection(e.to_string()))
            })
            .await
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn execute(&self, query: &str, params: QueryParams) -> Result<Vec<Record>, GraphError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GraphError::Closed);
        }

        let client = self.client().await?;
        let body = TxRequest {
            statements: vec![TxStatement {
                statement: query,
                parameters: params,
                result_data_contents: ["row", "graph"],
            }],
        };

        let mut req = client.post(self.commit_url()).json(&body);
        if let Some(ref password) = self.password {
            req = req.basic_auth(&self.config.username, Some(password.expose_secret()));
        }

        let response = req
            .send()
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Graph endpoint returned HTTP {}", status);
            return Err(GraphError::Connection(format!("HTTP {}: {}", status, text)));
        }

        let tx: TxResponse = response
            .json()
            .await
            .map_err(|e| GraphError::InvalidResponse(e.to_string()))?;

        decode_response(tx)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Graph connection closed");
        }
    }
}

#[derive(Serialize)]
struct TxRequest<'a> {
    statements: Vec<TxStatement<'a>>,
}

#[derive(Serialize)]
struct TxStatement<'a> {
    statement: &'a str,
    parameters: QueryParams,
    #[serde(rename = "resultDataContents")]
    result_data_contents: [&'static str; 2],
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    #[serde(default)]
    row: Vec<Json>,
    #[serde(default)]
    meta: Vec<Json>,
    #[serde(default)]
    graph: TxGraph,
}

#[derive(Debug, Default, Deserialize)]
struct TxGraph {
    #[serde(default)]
    nodes: Vec<TxNode>,
    #[serde(default)]
    relationships: Vec<TxRelationship>,
}

#[derive(Debug, Deserialize)]
struct TxNode {
    id: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    properties: serde_json::Map<String, Json>,
}

#[derive(Debug, Deserialize)]
struct TxRelationship {
    id: String,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(rename = "startNode")]
    start_node: String,
    #[serde(rename = "endNode")]
    end_node: String,
    #[serde(default)]
    properties: serde_json::Map<String, Json>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// Graph entities of one row, indexed by id
struct RowGraph {
    nodes: HashMap<i64, GraphNode>,
    relationships: HashMap<i64, GraphRelationship>,
}

impl RowGraph {
    fn from_tx(graph: TxGraph) -> Self {
        let nodes = graph
            .nodes
            .into_iter()
            .filter_map(|n| {
                let id = n.id.parse::<i64>().ok()?;
                Some((
                    id,
                    GraphNode {
                        id: NodeId(id),
                        labels: n.labels,
                        properties: to_properties(n.properties),
                    },
                ))
            })
            .collect();

        let relationships = graph
            .relationships
            .into_iter()
            .filter_map(|r| {
                let id = r.id.parse::<i64>().ok()?;
                let start = r.start_node.parse::<i64>().ok()?;
                let end = r.end_node.parse::<i64>().ok()?;
                let mut rel = GraphRelationship::new(RelId(id), NodeId(start), NodeId(end), r.rel_type);
                rel.properties = to_properties(r.properties);
                Some((id, rel))
            })
            .collect();

        Self { nodes, relationships }
    }
}

fn to_properties(map: serde_json::Map<String, Json>) -> HashMap<String, GraphValue> {
    map.into_iter().map(|(k, v)| (k, GraphValue::from_json(v))).collect()
}

fn decode_response(tx: TxResponse) -> Result<Vec<Record>, GraphError> {
    if let Some(err) = tx.errors.into_iter().next() {
        return Err(GraphError::query(err.code, err.message));
    }

    let Some(result) = tx.results.into_iter().next() else {
        return Ok(Vec::new());
    };

    let columns = result.columns;
    Ok(result
        .data
        .into_iter()
        .map(|row| {
            let graph = RowGraph::from_tx(row.graph);
            let mut meta = row.meta.into_iter();
            columns
                .iter()
                .cloned()
                .zip(row.row)
                .map(|(column, value)| {
                    let meta = meta.next().unwrap_or(Json::Null);
                    (column, decode_value(value, &meta, &graph))
                })
                .collect()
        })
        .collect())
}

/// Decode one cell using its meta entry and the row's graph section
fn decode_value(value: Json, meta: &Json, graph: &RowGraph) -> GraphValue {
    match meta {
        Json::Object(entry) => {
            let id = entry.get("id").and_then(Json::as_i64);
            match (entry.get("type").and_then(Json::as_str), id) {
                (Some("node"), Some(id)) => match graph.nodes.get(&id) {
                    Some(node) => GraphValue::from(node.clone()),
                    None => {
                        let mut node = GraphNode::new(NodeId(id));
                        if let Json::Object(props) = value {
                            node.properties = to_properties(props);
                        }
                        GraphValue::from(node)
                    }
                },
                (Some("relationship"), Some(id)) => match graph.relationships.get(&id) {
                    Some(rel) => GraphValue::from(rel.clone()),
                    None => GraphValue::from_json(value),
                },
                _ => GraphValue::from_json(value),
            }
        }
        Json::Array(metas) => match value {
            Json::Array(items) if items.len() == metas.len() => {
                let decoded: Vec<GraphValue> = items
                    .into_iter()
                    .zip(metas.iter())
                    .map(|(item, meta)| decode_value(item, meta, graph))
                    .collect();
                into_path(decoded)
            }
            other => GraphValue::from_json(other),
        },
        _ => GraphValue::from_json(value),
    }
}

/// A list alternating node, relationship, node, ... is a path; anything else stays a list
fn into_path(items: Vec<GraphValue>) -> GraphValue {
    let is_path = items.len() >= 3
        && items.len() % 2 == 1
        && items.iter().enumerate().all(|(i, item)| {
            if i % 2 == 0 {
                item.as_node().is_some()
            } else {
                item.as_relationship().is_some()
            }
        });

    if !is_path {
        return GraphValue::List(items);
    }

    let mut path = GraphPath::default();
    for item in items {
        match item {
            GraphValue::Node(node) => path.nodes.push(*node),
            GraphValue::Relationship(rel) => path.relationships.push(*rel),
            _ => {}
        }
    }
    GraphValue::Path(Box::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Json) -> Result<Vec<Record>, GraphError> {
        decode_response(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn test_decode_scalar_columns() {
        let rows = parse(json!({
            "results": [{
                "columns": ["labels"],
                "data": [{"row": [["Entity", "Document"]], "meta": [[null, null]], "graph": {"nodes": [], "relationships": []}}]
            }],
            "errors": []
        }))
        .unwrap();

        assert_eq!(rows.len(), 1);
        let labels = rows[0]["labels"].as_list().unwrap();
        assert_eq!(labels[0].as_str(), Some("Entity"));
    }

    #[test]
    fn test_decode_node_uses_graph_labels() {
        let rows = parse(json!({
            "results": [{
                "columns": ["n"],
                "data": [{
                    "row": [{"name": "Microsoft"}],
                    "meta": [{"id": 4, "type": "node", "deleted": false}],
                    "graph": {"nodes": [{"id": "4", "labels": ["Entity"], "properties": {"name": "Microsoft"}}], "relationships": []}
                }]
            }],
            "errors": []
        }))
        .unwrap();

        let node = rows[0]["n"].as_node().unwrap();
        assert_eq!(node.id, NodeId(4));
        assert!(node.has_label("Entity"));
        assert_eq!(node.name().as_deref(), Some("Microsoft"));
    }

    #[test]
    fn test_decode_path() {
        let rows = parse(json!({
            "results": [{
                "columns": ["path", "path_length"],
                "data": [{
                    "row": [[{"name": "LinkedIn"}, {}, {"name": "Microsoft"}], 1],
                    "meta": [[
                        {"id": 1, "type": "node"},
                        {"id": 7, "type": "relationship"},
                        {"id": 2, "type": "node"}
                    ], null],
                    "graph": {
                        "nodes": [
                            {"id": "1", "labels": ["Entity"], "properties": {"name": "LinkedIn"}},
                            {"id": "2", "labels": ["Entity"], "properties": {"name": "Microsoft"}}
                        ],
                        "relationships": [
                            {"id": "7", "type": "OWNED_BY", "startNode": "1", "endNode": "2", "properties": {}}
                        ]
                    }
                }]
            }],
            "errors": []
        }))
        .unwrap();

        let path = rows[0]["path"].as_path().unwrap();
        assert_eq!(path.nodes.len(), 2);
        assert_eq!(path.relationships[0].rel_type, "OWNED_BY");
        assert_eq!(path.relationships[0].start, NodeId(1));
        assert_eq!(rows[0]["path_length"].as_int(), Some(1));
    }

    #[test]
    fn test_decode_error_entry() {
        let err = parse(json!({
            "results": [],
            "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "Invalid input 'MATC'"}]
        }))
        .unwrap_err();

        match err {
            GraphError::Query { code, message } => {
                assert!(code.ends_with("SyntaxError"));
                assert!(message.contains("MATC"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_list_of_nodes_is_not_a_path() {
        let graph = RowGraph {
            nodes: HashMap::new(),
            relationships: HashMap::new(),
        };
        let value = decode_value(
            json!([{"name": "A"}, {"name": "B"}]),
            &json!([{"id": 1, "type": "node"}, {"id": 2, "type": "node"}]),
            &graph,
        );
        assert_eq!(value.as_list().map(|l| l.len()), Some(2));
    }

    #[tokio::test]
    async fn test_closed_store_rejects_queries() {
        let store = Neo4jHttpStore::new(GraphConfig::default());
        store.close().await;
        let result = store.execute("RETURN 1", QueryParams::new()).await;
        assert!(matches!(result, Err(GraphError::Closed)));
    }
}
