use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use truth_engine::{
    api::{build_router, AppState},
    graph::{EntityIdCache, GraphStore, Neo4jHttpStore},
    llm::OpenAiCompletionClient,
    telemetry,
    verify::WikipediaClient,
    Config, Orchestrator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    telemetry::init(&config.logging);

    info!("Starting truth-engine v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn GraphStore> = Arc::new(Neo4jHttpStore::new(config.graph.clone()));
    let llm = Arc::new(
        OpenAiCompletionClient::new(config.llm.clone())
            .context("Failed to create completion client")?,
    );
    let lookup = Arc::new(
        WikipediaClient::new(&config.ground_truth).context("Failed to create Wikipedia client")?,
    );

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        llm,
        lookup,
        config.pipeline.clone(),
        EntityIdCache::new(config.graph.entity_cache_size),
    ));

    let router = build_router(
        AppState {
            orchestrator: orchestrator.clone(),
        },
        config.server.max_body_bytes,
    );

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
