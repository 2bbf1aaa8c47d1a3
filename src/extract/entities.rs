//! Entity and relationship extraction from free text

use crate::graph::GraphExtraction;
use crate::llm::CompletionClient;
use std::sync::Arc;
use tracing::{error, info, warn};

const EXTRACTION_PROMPT: &str = r#"You are an expert at extracting structured information from text.
Extract all entities (people, organizations, locations, products, concepts) and their relationships from the given text.

For entities, identify:
- name: The exact name of the entity
- type: Category like Person, Organization, Location, Product, Concept, Event, etc.
- properties: Any additional relevant information

For relationships, identify:
- source: The starting entity
- target: The ending entity
- type: The relationship type (use verbs in UPPERCASE like OWNS, MANAGES, LOCATED_IN, PRODUCES, etc.)
- properties: Any additional context about the relationship

Respond with a single JSON object and no extra text:
{"entities": [{"name": "...", "type": "...", "properties": {}}],
 "relationships": [{"source": "...", "target": "...", "type": "...", "properties": {}}]}

Be thorough and extract all meaningful entities and relationships."#;

/// Turns text into a [`GraphExtraction`] using the completion capability
pub struct EntityExtractor {
    llm: Arc<dyn CompletionClient>,
}

impl EntityExtractor {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Extract from one text; failures yield an empty extraction
    pub async fn extract(&self, text: &str) -> GraphExtraction {
        let user = format!("Text to analyze:\n\n{}", text);
        let response = match self.llm.complete(EXTRACTION_PROMPT, &user).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error extracting entities and relationships: {}", e);
                return GraphExtraction::default();
            }
        };

        match parse_extraction(&response) {
            Ok(extraction) => {
                info!(
                    "Extracted {} entities and {} relationships",
                    extraction.entities.len(),
                    extraction.relationships.len()
                );
                extraction
            }
            Err(e) => {
                warn!("Could not parse extraction output: {}", e);
                GraphExtraction::default()
            }
        }
    }

    /// Extract from several texts, merging entities by name
    pub async fn extract_all(&self, texts: &[String]) -> GraphExtraction {
        let mut merged = GraphExtraction::default();
        for (i, text) in texts.iter().enumerate() {
            info!("Processing text {}/{}", i + 1, texts.len());
            merged.merge(self.extract(text).await);
        }
        info!(
            "Total: {} unique entities and {} relationships",
            merged.entities.len(),
            merged.relationships.len()
        );
        merged
    }
}

/// Parse the JSON object embedded in a completion, tolerating code fences and prose around it
pub fn parse_extraction(response: &str) -> Result<GraphExtraction, serde_json::Error> {
    let body = match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => response,
    };
    serde_json::from_str(body)
}
