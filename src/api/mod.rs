//! HTTP API for queries, fact checks, paths and ingestion

pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, AppState};
pub use routes::build_router;
