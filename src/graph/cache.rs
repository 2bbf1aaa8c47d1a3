//! Entity name -> node id cache

use super::model::NodeId;
use moka::future::Cache;

/// Ids of entities written by the graph builder, keyed by exact name.
///
/// Filled during ingestion and read by subgraph extraction to skip the
/// name search for known entities.
#[derive(Clone)]
pub struct EntityIdCache {
    inner: Cache<String, NodeId>,
}

impl EntityIdCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(capacity).build(),
        }
    }

    pub async fn get(&self, name: &str) -> Option<NodeId> {
        self.inner.get(name).await
    }

    pub async fn insert(&self, name: impl Into<String>, id: NodeId) {
        self.inner.insert(name.into(), id).await;
    }

    pub async fn invalidate_all(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for EntityIdCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = EntityIdCache::new(100);
        cache.insert("Microsoft", NodeId(2)).await;

        assert_eq!(cache.get("Microsoft").await, Some(NodeId(2)));
        assert_eq!(cache.get("microsoft").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = EntityIdCache::new(100);
        cache.insert("LinkedIn", NodeId(1)).await;
        cache.invalidate_all().await;

        assert_eq!(cache.get("LinkedIn").await, None);
    }
}
