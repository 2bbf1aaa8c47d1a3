//! Fact verification: facts, ground truth and confidence

pub mod confidence;
pub mod facts;
pub mod ground_truth;
pub mod models;
pub mod wikipedia;

pub use confidence::{parse_confidence, ConfidenceSynthesizer, DEFAULT_CONFIDENCE};
pub use facts::extract_facts;
pub use ground_truth::{truncate_chars, GroundTruthResolver, LookupPage, TextLookup};
pub use models::{Fact, FactVerification, GroundTruth, GroundTruthRecord, VerificationResult};
pub use wikipedia::WikipediaClient;
