//! Schema vocabulary of the graph store

use super::store::GraphStore;
use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Rendered schema used when the store cannot be introspected
pub const FALLBACK_SCHEMA: &str = "Node Labels: Entity, Document\nRelationship Types: EXTRACTED_FROM";

/// Node labels and relationship types known to the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
}

impl GraphSchema {
    /// Two-line description handed to the query generator
    pub fn render(&self) -> String {
        format!(
            "Node Labels: {}\nRelationship Types: {}",
            self.labels.join(", "),
            self.relationship_types.join(", ")
        )
    }
}

/// Reads the label and relationship-type vocabulary from a store
pub struct SchemaIntrospector {
    store: Arc<dyn GraphStore>,
}

impl SchemaIntrospector {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self) -> Result<GraphSchema, GraphError> {
        let labels = self.store.labels().await?;
        let relationship_types = self.store.relationship_types().await?;
        Ok(GraphSchema {
            labels,
            relationship_types,
        })
    }

    /// Rendered schema, or [`FALLBACK_SCHEMA`] if introspection fails
    pub async fn describe(&self) -> String {
        match self.fetch().await {
            Ok(schema) => schema.render(),
            Err(e) => {
                warn!("Schema introspection failed, using fallback: {}", e);
                FALLBACK_SCHEMA.to_string()
            }
        }
    }
}
