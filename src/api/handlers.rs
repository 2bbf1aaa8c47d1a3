//! HTTP handlers for the fact-checking API

use crate::graph::BuildStats;
use crate::lineage::PathResult;
use crate::metrics::METRICS;
use crate::orchestrator::{FactCheckResponse, Orchestrator};
use crate::query::{QueryAttemptResult, QueryValidation};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// API error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn validation_error(message: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new("VALIDATION_ERROR", message)),
    )
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub max_attempts: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub cypher: String,
}

#[derive(Debug, Deserialize)]
pub struct FactCheckRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub document: Option<String>,
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Translate a question into Cypher and run it
///
/// POST /api/v1/query
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<QueryAttemptResult> {
    if request.question.trim().is_empty() {
        return Err(validation_error("Question cannot be empty"));
    }
    if request.max_attempts == Some(0) {
        return Err(validation_error("max_attempts must be at least 1"));
    }

    let result = state
        .orchestrator
        .translate_and_execute(&request.question, request.max_attempts)
        .await;
    Ok(Json(result))
}

/// Dry-run a Cypher query
///
/// POST /api/v1/query/validate
pub async fn validate_query(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<QueryValidation> {
    if request.cypher.trim().is_empty() {
        return Err(validation_error("Cypher cannot be empty"));
    }

    Ok(Json(state.orchestrator.validate_query(&request.cypher).await))
}

/// Fact-check a question against the graph and ground truth
///
/// POST /api/v1/fact-check
pub async fn fact_check(
    State(state): State<AppState>,
    Json(request): Json<FactCheckRequest>,
) -> ApiResult<FactCheckResponse> {
    info!("Fact check request");

    if request.question.trim().is_empty() {
        return Err(validation_error("Question cannot be empty"));
    }

    Ok(Json(state.orchestrator.check_facts(&request.question).await))
}

/// Shortest path between two entities
///
/// POST /api/v1/path
pub async fn find_path(
    State(state): State<AppState>,
    Json(request): Json<PathRequest>,
) -> ApiResult<PathResult> {
    if request.start.trim().is_empty() || request.end.trim().is_empty() {
        return Err(validation_error("Start and end entities cannot be empty"));
    }
    if request.max_depth == Some(0) {
        return Err(validation_error("max_depth must be at least 1"));
    }

    let result = state
        .orchestrator
        .find_path(&request.start, &request.end, request.max_depth)
        .await;
    Ok(Json(result))
}

/// Extract entities from texts and merge them into the graph
///
/// POST /api/v1/ingest
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<BuildStats> {
    info!("Ingest request: {} texts", request.texts.len());

    if request.texts.iter().all(|t| t.trim().is_empty()) {
        return Err(validation_error("Texts cannot be empty"));
    }

    match state
        .orchestrator
        .ingest_texts(request.document.as_deref(), &request.texts)
        .await
    {
        Ok(stats) => Ok(Json(stats)),
        Err(e) => {
            error!("Ingest failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new("INTERNAL_ERROR", e.to_string())),
            ))
        }
    }
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics
pub async fn metrics() -> String {
    METRICS.export_prometheus()
}
