//! Fact-checking workflow

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extract::{EntityExtractor, SubgraphExtractor};
use crate::graph::{BuildStats, EntityIdCache, GraphBuilder, GraphStore, Subgraph};
use crate::lineage::{lineage_map, LineageMap, LineageReconstructor, PathResult};
use crate::llm::CompletionClient;
use crate::metrics::METRICS;
use crate::query::{QueryAttemptResult, QueryTranslator, QueryValidation};
use crate::time_stage;
use crate::verify::{
    extract_facts, ConfidenceSynthesizer, FactVerification, GroundTruthResolver, TextLookup,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Message returned when no subgraph could be retrieved
pub const NO_DATA_MESSAGE: &str = "No relevant information found in the knowledge graph";

/// Result of one fact check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCheckResponse {
    pub run_id: Uuid,
    pub checked_at: DateTime<Utc>,
    pub query: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub subgraph: Subgraph,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<FactVerification>,
    pub confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage: Option<LineageMap>,
}

/// Sequences extraction, verification and lineage for each request
pub struct Orchestrator {
    store: Arc<dyn GraphStore>,
    pipeline: PipelineConfig,
    translator: QueryTranslator,
    extractor: SubgraphExtractor,
    resolver: GroundTruthResolver,
    synthesizer: ConfidenceSynthesizer,
    lineage: LineageReconstructor,
    entity_extractor: EntityExtractor,
    builder: GraphBuilder,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn GraphStore>,
        llm: Arc<dyn CompletionClient>,
        lookup: Arc<dyn TextLookup>,
        pipeline: PipelineConfig,
        cache: EntityIdCache,
    ) -> Self {
        Self {
            translator: QueryTranslator::new(store.clone(), llm.clone()),
            extractor: SubgraphExtractor::new(
                store.clone(),
                llm.clone(),
                cache.clone(),
                pipeline.max_matches_per_entity,
            ),
            resolver: GroundTruthResolver::new(
                lookup,
                pipeline.max_ground_truth_entities,
                pipeline.summary_chars,
            ),
            synthesizer: ConfidenceSynthesizer::new(llm.clone(), pipeline.max_facts_compared),
            lineage: LineageReconstructor::new(store.clone()),
            entity_extractor: EntityExtractor::new(llm),
            builder: GraphBuilder::new(store.clone(), cache),
            store,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Run the complete fact-checking workflow for `question`
    pub async fn check_facts(&self, question: &str) -> FactCheckResponse {
        let run_id = Uuid::new_v4();
        info!("Starting fact-checking workflow {} for query: {}", run_id, question);

        info!("Step 1: Extracting relevant sub-graph...");
        let subgraph = time_stage!(
            "extract",
            self.extractor.extract(question, self.pipeline.node_cap).await
        );

        if subgraph.is_empty() {
            warn!("No relevant sub-graph found");
            METRICS.record_fact_check("no_data");
            return FactCheckResponse {
                run_id,
                checked_at: Utc::now(),
                query: question.to_string(),
                success: false,
                message: Some(NO_DATA_MESSAGE.to_string()),
                answer: None,
                subgraph,
                verification: None,
                confidence_score: 0.0,
                lineage: None,
            };
        }

        info!("Step 2: Verifying facts against ground truth...");
        let verification = time_stage!("verify", self.verify(&subgraph, question).await);

        info!("Step 3: Generating answer with lineage...");
        let answer = compose_answer(&subgraph, &verification);
        let lineage = time_stage!("lineage", lineage_map(question, &subgraph));

        let status = if verification.verification.failed {
            "error"
        } else {
            "verified"
        };
        METRICS.record_fact_check(status);

        FactCheckResponse {
            run_id,
            checked_at: Utc::now(),
            query: question.to_string(),
            success: true,
            message: None,
            answer: Some(answer),
            confidence_score: verification.confidence_score,
            subgraph,
            verification: Some(verification),
            lineage: Some(lineage),
        }
    }

    async fn verify(&self, subgraph: &Subgraph, question: &str) -> FactVerification {
        let facts = extract_facts(subgraph);
        info!("Extracted {} facts from subgraph", facts.len());

        let ground_truth = self.resolver.resolve(&subgraph.entities).await;
        let verification = self.synthesizer.synthesize(&facts, &ground_truth, question).await;

        FactVerification {
            query: question.to_string(),
            confidence_score: verification.confidence,
            facts,
            ground_truth,
            verification,
        }
    }

    /// Translate and execute with the configured attempt bound unless overridden
    pub async fn translate_and_execute(
        &self,
        question: &str,
        max_attempts: Option<usize>,
    ) -> QueryAttemptResult {
        let attempts = max_attempts.unwrap_or(self.pipeline.max_attempts);
        time_stage!(
            "translate",
            self.translator.translate_and_execute(question, attempts).await
        )
    }

    pub async fn validate_query(&self, cypher: &str) -> QueryValidation {
        self.translator.validate(cypher).await
    }

    pub async fn find_path(&self, start: &str, end: &str, max_depth: Option<usize>) -> PathResult {
        let depth = max_depth.unwrap_or(self.pipeline.path_max_depth);
        self.lineage.shortest_path(start, end, depth).await
    }

    /// Extract entities from `texts` and merge them into the store
    pub async fn ingest_texts(&self, document: Option<&str>, texts: &[String]) -> Result<BuildStats> {
        let extraction = time_stage!("ingest_extract", self.entity_extractor.extract_all(texts).await);
        let stats = time_stage!("ingest_build", self.builder.build(&extraction, document).await)?;
        Ok(stats)
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

/// Human-readable answer summarizing counts, analysis and sources
pub fn compose_answer(subgraph: &Subgraph, verification: &FactVerification) -> String {
    let mut answer = String::from("Based on the knowledge graph analysis:\n\n");
    answer.push_str(&format!(
        "Found {} relevant entities and {} relationships.\n",
        subgraph.nodes().len(),
        subgraph.relationships().len()
    ));
    answer.push_str(&format!("Confidence Score: {:.2}\n\n", verification.confidence_score));

    answer.push_str("Verification Analysis:\n");
    answer.push_str(&verification.verification.analysis);
    answer.push_str("\n\n");

    if !verification.ground_truth.is_empty() {
        answer.push_str("Ground Truth Sources:\n");
        for (entity, record) in &verification.ground_truth {
            if let Some(url) = record.url() {
                answer.push_str(&format!("- {}: {}\n", entity, url));
            }
        }
    }

    answer
}
