//! Retrieval of the subgraph relevant to a question

use crate::graph::{EntityIdCache, GraphStore, NodeId, Subgraph};
use crate::llm::CompletionClient;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const ENTITY_PROMPT: &str = "You are an expert at identifying key entities in questions.
Extract all important entities (people, organizations, products, locations, concepts) from the query.
Return only the entity names, one per line, without any additional text or formatting.";

/// Finds the entities a question mentions and pulls their neighborhood from the store
pub struct SubgraphExtractor {
    store: Arc<dyn GraphStore>,
    llm: Arc<dyn CompletionClient>,
    cache: EntityIdCache,
    max_matches: usize,
}

impl SubgraphExtractor {
    pub fn new(
        store: Arc<dyn GraphStore>,
        llm: Arc<dyn CompletionClient>,
        cache: EntityIdCache,
        max_matches: usize,
    ) -> Self {
        Self {
            store,
            llm,
            cache,
            max_matches,
        }
    }

    /// Candidate entity names, one per non-blank line of the completion
    pub async fn identify_entities(&self, question: &str) -> Vec<String> {
        match self.llm.complete(ENTITY_PROMPT, &format!("Query: {}", question)).await {
            Ok(text) => {
                let entities: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect();
                info!("Identified entities: {:?}", entities);
                entities
            }
            Err(e) => {
                error!("Error identifying entities: {}", e);
                Vec::new()
            }
        }
    }

    async fn resolve_ids(&self, entities: &[String]) -> Option<Vec<NodeId>> {
        let mut ids: Vec<NodeId> = Vec::new();

        for entity in entities {
            if let Some(id) = self.cache.get(entity).await {
                debug!("Entity cache hit for {}", entity);
                if !ids.contains(&id) {
                    ids.push(id);
                }
                continue;
            }

            match self.store.search_nodes("name", entity, self.max_matches).await {
                Ok(nodes) => {
                    for node in nodes {
                        if !ids.contains(&node.id) {
                            ids.push(node.id);
                        }
                    }
                }
                Err(e) => {
                    error!("Node search failed for {}: {}", entity, e);
                    return None;
                }
            }
        }

        Some(ids)
    }

    /// Subgraph of at most `node_cap` nodes around the entities in `question`.
    ///
    /// Never fails: capability errors yield an empty subgraph that keeps
    /// whatever entity names were identified.
    pub async fn extract(&self, question: &str, node_cap: usize) -> Subgraph {
        info!("Extracting sub-graph for query: {}", question);

        let entities = self.identify_entities(question).await;
        if entities.is_empty() {
            warn!("No entities identified from query");
            return Subgraph::new(question, Vec::new());
        }

        let Some(ids) = self.resolve_ids(&entities).await else {
            return Subgraph::new(question, entities);
        };
        if ids.is_empty() {
            warn!("No matching nodes found in graph");
            return Subgraph::new(question, entities);
        }

        let neighborhood = match self.store.neighborhood(&ids).await {
            Ok(hood) => hood,
            Err(e) => {
                error!("Error getting subgraph: {}", e);
                return Subgraph::new(question, entities);
            }
        };

        let mut subgraph = Subgraph::new(question, entities);
        for node in neighborhood.nodes.into_iter().chain(neighborhood.connected) {
            subgraph.add_node(node);
        }
        subgraph.truncate_nodes(node_cap);
        for rel in neighborhood.relationships {
            subgraph.add_relationship(rel);
        }

        info!(
            "Extracted sub-graph with {} nodes and {} relationships",
            subgraph.nodes().len(),
            subgraph.relationships().len()
        );
        subgraph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::graph::MemoryGraphStore;
    use async_trait::async_trait;

    struct FixedLlm(Result<&'static str, ()>);

    #[async_trait]
    impl CompletionClient for FixedLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            self.0
                .map(String::from)
                .map_err(|_| LlmError::ApiError("HTTP 500".to_string()))
        }
    }

    fn store() -> Arc<MemoryGraphStore> {
        let store = Arc::new(MemoryGraphStore::new());
        let linkedin = store.add_entity("LinkedIn", "Organization");
        let microsoft = store.add_entity("Microsoft", "Organization");
        let github = store.add_entity("GitHub", "Organization");
        store.add_relationship(linkedin, microsoft, "OWNED_BY");
        store.add_relationship(github, microsoft, "OWNED_BY");
        store
    }

    fn extractor(store: Arc<MemoryGraphStore>, llm: FixedLlm, cache: EntityIdCache) -> SubgraphExtractor {
        SubgraphExtractor::new(store, Arc::new(llm), cache, 5)
    }

    #[tokio::test]
    async fn test_identify_entities_skips_blank_lines() {
        let ex = extractor(store(), FixedLlm(Ok("LinkedIn\n\n  Microsoft  \n")), EntityIdCache::new(10));
        assert_eq!(ex.identify_entities("q").await, vec!["LinkedIn", "Microsoft"]);
    }

    #[tokio::test]
    async fn test_completion_error_yields_empty_subgraph() {
        let ex = extractor(store(), FixedLlm(Err(())), EntityIdCache::new(10));
        let subgraph = ex.extract("Who owns LinkedIn?", 50).await;
        assert!(subgraph.is_empty());
        assert!(subgraph.entities.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_entity_keeps_entity_list() {
        let ex = extractor(store(), FixedLlm(Ok("Nokia")), EntityIdCache::new(10));
        let subgraph = ex.extract("Who owns Nokia?", 50).await;
        assert!(subgraph.is_empty());
        assert_eq!(subgraph.entities, vec!["Nokia"]);
    }

    #[tokio::test]
    async fn test_one_hop_neighborhood() {
        let ex = extractor(store(), FixedLlm(Ok("LinkedIn")), EntityIdCache::new(10));
        let subgraph = ex.extract("Who owns LinkedIn?", 50).await;

        assert_eq!(subgraph.nodes().len(), 2);
        assert_eq!(subgraph.nodes()[0].name().as_deref(), Some("LinkedIn"));
        assert_eq!(subgraph.relationships().len(), 1);
        assert_eq!(subgraph.query, "Who owns LinkedIn?");
    }

    #[tokio::test]
    async fn test_node_cap_keeps_seeds_and_relationships() {
        let ex = extractor(store(), FixedLlm(Ok("Microsoft")), EntityIdCache::new(10));
        let subgraph = ex.extract("What does Microsoft own?", 1).await;

        assert_eq!(subgraph.nodes().len(), 1);
        assert_eq!(subgraph.nodes()[0].name().as_deref(), Some("Microsoft"));
        assert_eq!(subgraph.relationships().len(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_search() {
        let store = store();
        let cache = EntityIdCache::new(10);
        let ghost = store.add_node(&["Entity"], vec![]);
        cache.insert("Ghost", ghost).await;

        let ex = extractor(store, FixedLlm(Ok("Ghost")), cache);
        let subgraph = ex.extract("Ghost?", 50).await;

        assert_eq!(subgraph.nodes().len(), 1);
        assert_eq!(subgraph.nodes()[0].id, ghost);
    }

    #[tokio::test]
    async fn test_extract_is_repeatable() {
        let store = store();
        let first = extractor(store.clone(), FixedLlm(Ok("LinkedIn")), EntityIdCache::new(10))
            .extract("Who owns LinkedIn?", 50)
            .await;
        let second = extractor(store, FixedLlm(Ok("LinkedIn")), EntityIdCache::new(10))
            .extract("Who owns LinkedIn?", 50)
            .await;
        assert_eq!(first, second);
    }
}
