//! Graph model, store capability and adapters

pub mod builder;
pub mod cache;
pub mod extraction;
pub mod memory;
pub mod model;
pub mod neo4j;
pub mod schema;
pub mod store;
pub mod subgraph;

pub use builder::{BuildStats, GraphBuilder};
pub use cache::EntityIdCache;
pub use extraction::{ExtractedEntity, ExtractedRelationship, GraphExtraction};
pub use memory::MemoryGraphStore;
pub use model::{
    properties_to_json, GraphNode, GraphPath, GraphRelationship, GraphValue, NodeId, PropertyMap,
    Record, RelId, UNKNOWN_NAME,
};
pub use neo4j::Neo4jHttpStore;
pub use schema::{GraphSchema, SchemaIntrospector, FALLBACK_SCHEMA};
pub use store::{params, GraphStore, Neighborhood, PathMatch, QueryParams};
pub use subgraph::Subgraph;
