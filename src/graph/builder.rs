//! Writes extracted entities and relationships into the store

use super::cache::EntityIdCache;
use super::extraction::GraphExtraction;
use super::model::NodeId;
use super::store::GraphStore;
use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<NodeId>,
    pub entities_merged: usize,
    pub relationships_merged: usize,
    pub relationships_skipped: usize,
}

/// Merges a [`GraphExtraction`] into the store and records entity ids
pub struct GraphBuilder {
    store: Arc<dyn GraphStore>,
    cache: EntityIdCache,
}

impl GraphBuilder {
    pub fn new(store: Arc<dyn GraphStore>, cache: EntityIdCache) -> Self {
        Self { store, cache }
    }

    /// Merge `extraction`, optionally linking every entity to `document`.
    ///
    /// Entity merge failures abort the build. A relationship that cannot be
    /// merged is logged and counted as skipped.
    pub async fn build(
        &self,
        extraction: &GraphExtraction,
        document: Option<&str>,
    ) -> Result<BuildStats, GraphError> {
        let mut stats = BuildStats::default();

        if let Some(name) = document {
            stats.document_id = Some(self.store.merge_document(name).await?);
        }

        for entity in &extraction.entities {
            let id = self.store.merge_entity(entity, stats.document_id).await?;
            self.cache.insert(entity.name.clone(), id).await;
            stats.entities_merged += 1;
        }

        for rel in &extraction.relationships {
            match self
                .store
                .merge_relationship(&rel.source, &rel.target, &rel.rel_type, &rel.properties)
                .await
            {
                Ok(Some(_)) => stats.relationships_merged += 1,
                Ok(None) => {
                    debug!("Relationship endpoint missing: {} -> {}", rel.source, rel.target);
                    stats.relationships_skipped += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to create relationship {} -[{}]-> {}: {}",
                        rel.source, rel.rel_type, rel.target, e
                    );
                    stats.relationships_skipped += 1;
                }
            }
        }

        info!(
            "Graph build complete: {} entities, {} relationships ({} skipped)",
            stats.entities_merged, stats.relationships_merged, stats.relationships_skipped
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memory::MemoryGraphStore;
    use serde_json::json;

    fn extraction() -> GraphExtraction {
        serde_json::from_value(json!({
            "entities": [
                {"name": "Microsoft", "type": "Organization"},
                {"name": "LinkedIn", "type": "Organization", "properties": {"founded": 2002}}
            ],
            "relationships": [
                {"source": "Microsoft", "target": "LinkedIn", "type": "acquired"},
                {"source": "Microsoft", "target": "Nokia", "type": "acquired"},
                {"source": "LinkedIn", "target": "Microsoft", "type": "!!!"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_links_document_and_fills_cache() {
        let store = Arc::new(MemoryGraphStore::new());
        let cache = EntityIdCache::new(100);
        let builder = GraphBuilder::new(store.clone(), cache.clone());

        let stats = builder.build(&extraction(), Some("press-release")).await.unwrap();

        assert!(stats.document_id.is_some());
        assert_eq!(stats.entities_merged, 2);
        assert_eq!(stats.relationships_merged, 1);
        assert_eq!(stats.relationships_skipped, 2);
        assert!(cache.get("LinkedIn").await.is_some());

        let types = store.relationship_types().await.unwrap();
        assert!(types.contains(&"EXTRACTED_FROM".to_string()));
        assert!(types.contains(&"ACQUIRED".to_string()));
    }

    #[tokio::test]
    async fn test_build_twice_is_idempotent() {
        let store = Arc::new(MemoryGraphStore::new());
        let builder = GraphBuilder::new(store.clone(), EntityIdCache::new(100));

        builder.build(&extraction(), None).await.unwrap();
        let nodes = store.node_count();
        let rels = store.relationship_count();
        builder.build(&extraction(), None).await.unwrap();

        assert_eq!(store.node_count(), nodes);
        assert_eq!(store.relationship_count(), rels);
    }
}
