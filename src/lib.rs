//! Knowledge-graph fact checking
//!
//! Translates questions into Cypher with self-correcting retries, pulls the
//! relevant subgraph, checks its facts against an encyclopedic source and
//! explains the graph paths behind each answer.

pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod lineage;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod query;
pub mod telemetry;
pub mod verify;

pub use config::Config;
pub use error::{EngineError, Result};
pub use orchestrator::{FactCheckResponse, Orchestrator};
