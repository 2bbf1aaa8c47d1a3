//! Extraction from questions and free text

pub mod entities;
pub mod subgraph;

pub use entities::{parse_extraction, EntityExtractor};
pub use subgraph::SubgraphExtractor;
