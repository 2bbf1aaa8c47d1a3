//! Confidence synthesis from facts and ground truth

use super::models::{Fact, GroundTruth, VerificationResult};
use crate::llm::CompletionClient;
use crate::metrics::METRICS;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error};

/// Score used when the analysis states no confidence
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const VERIFICATION_PROMPT: &str = "You are an expert fact-checker. Compare the facts from the knowledge graph with ground truth information.
For each fact, determine if it is:
- VERIFIED: Confirmed by ground truth
- CONTRADICTED: Contradicts ground truth
- UNVERIFIED: Not enough information to verify
- UNKNOWN: No ground truth available

Provide a confidence score (0-1) for your verification.
Return your analysis in a structured format.";

// Tried in order against the lowercased analysis
static CONFIDENCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"confidence[:\s]+([0-9.]+)",
        r"([0-9.]+)\s*confidence",
        r"score[:\s]+([0-9.]+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Read a confidence value out of free text.
///
/// The first pattern whose capture parses as a number wins. Values above 1
/// are read as percentages. The result is clamped to `[0, 1]`; text without a
/// usable number yields [`DEFAULT_CONFIDENCE`].
///
/// Trailing sentence periods are trimmed from a capture, so `"confidence: 0.9."`
/// reads as 0.9. A strict parse of the raw capture would fail there and end at
/// the default.
pub fn parse_confidence(text: &str) -> f64 {
    let lowered = text.to_lowercase();

    for pattern in CONFIDENCE_PATTERNS.iter() {
        let Some(captures) = pattern.captures(&lowered) else {
            continue;
        };
        let raw = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let Ok(mut score) = raw.trim_end_matches('.').parse::<f64>() else {
            continue;
        };
        if score > 1.0 {
            score /= 100.0;
        }
        return score.clamp(0.0, 1.0);
    }

    DEFAULT_CONFIDENCE
}

/// Fuses facts and ground truth into a scored narrative via the completion capability
pub struct ConfidenceSynthesizer {
    llm: Arc<dyn CompletionClient>,
    max_facts: usize,
}

impl ConfidenceSynthesizer {
    pub fn new(llm: Arc<dyn CompletionClient>, max_facts: usize) -> Self {
        Self { llm, max_facts }
    }

    fn build_prompt(&self, facts: &[Fact], ground_truth: &GroundTruth, question: &str) -> String {
        let fact_lines = facts
            .iter()
            .take(self.max_facts)
            .map(|fact| format!("- {}", fact))
            .collect::<Vec<_>>()
            .join("\n");

        let mut gt_text = String::new();
        for (entity, record) in ground_truth {
            if let Some(summary) = record.summary() {
                gt_text.push_str(&format!("\n{}: {}\n", entity, summary));
            }
        }
        if gt_text.is_empty() {
            gt_text.push_str("No ground truth available");
        }

        format!(
            "Query: {}\n\n\
             Facts from Knowledge Graph:\n{}\n\n\
             Ground Truth Information:\n{}\n\n\
             Analyze each fact and provide:\n\
             1. Verification status for key facts\n\
             2. Overall confidence score (0-1)\n\
             3. Summary of findings",
            question, fact_lines, gt_text
        )
    }

    pub async fn synthesize(
        &self,
        facts: &[Fact],
        ground_truth: &GroundTruth,
        question: &str,
    ) -> VerificationResult {
        let prompt = self.build_prompt(facts, ground_truth, question);
        debug!("Verification prompt: {}", prompt);

        match self.llm.complete(VERIFICATION_PROMPT, &prompt).await {
            Ok(analysis) => {
                let confidence = parse_confidence(&analysis);
                METRICS.record_confidence(confidence);
                VerificationResult {
                    analysis,
                    confidence,
                    facts_checked: facts.len(),
                    ground_truth_sources: ground_truth.len(),
                    failed: false,
                }
            }
            Err(e) => {
                error!("Error comparing facts: {}", e);
                VerificationResult {
                    analysis: format!("Error during verification: {}", e),
                    confidence: 0.0,
                    facts_checked: 0,
                    ground_truth_sources: 0,
                    failed: true,
                }
            }
        }
    }
}
