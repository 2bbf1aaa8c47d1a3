//! Data models for fact verification

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A short declarative statement derived from the subgraph
pub type Fact = String;

/// Ground truth for one entity: the resolved page, or why it could not be resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroundTruthRecord {
    Found {
        title: String,
        summary: String,
        url: String,
    },
    Failed {
        error: String,
    },
}

impl GroundTruthRecord {
    pub fn failed(error: impl Into<String>) -> Self {
        GroundTruthRecord::Failed { error: error.into() }
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            GroundTruthRecord::Found { summary, .. } => Some(summary),
            GroundTruthRecord::Failed { .. } => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            GroundTruthRecord::Found { url, .. } => Some(url),
            GroundTruthRecord::Failed { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, GroundTruthRecord::Found { .. })
    }
}

/// Entity name -> ground truth, in request order
pub type GroundTruth = IndexMap<String, GroundTruthRecord>;

/// Result of comparing facts with ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub analysis: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
    pub facts_checked: usize,
    pub ground_truth_sources: usize,
    /// Set when the comparison itself could not be run
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

/// Everything the verification stage produced for one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactVerification {
    pub query: String,
    pub facts: Vec<Fact>,
    pub ground_truth: GroundTruth,
    pub verification: VerificationResult,
    pub confidence_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_flat() {
        let found = GroundTruthRecord::Found {
            title: "LinkedIn".to_string(),
            summary: "LinkedIn is a business network.".to_string(),
            url: "https://en.wikipedia.org/wiki/LinkedIn".to_string(),
        };
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["title"], "LinkedIn");
        assert!(json.get("Found").is_none());

        let failed = serde_json::to_value(GroundTruthRecord::failed("timeout")).unwrap();
        assert_eq!(failed, serde_json::json!({"error": "timeout"}));
    }

    #[test]
    fn test_record_deserializes_both_shapes() {
        let found: GroundTruthRecord =
            serde_json::from_str(r#"{"title": "A", "summary": "B", "url": "C"}"#).unwrap();
        assert!(found.is_found());
        assert_eq!(found.url(), Some("C"));

        let failed: GroundTruthRecord = serde_json::from_str(r#"{"error": "nope"}"#).unwrap();
        assert!(!failed.is_found());
        assert_eq!(failed.summary(), None);
    }
}
