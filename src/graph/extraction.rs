//! Entities and relationships extracted from text, ready to be merged into the graph

use serde::{Deserialize, Serialize};

/// An entity extracted from text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// A relationship between two extracted entities, referenced by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Complete extraction result for one or more texts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphExtraction {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub relationships: Vec<ExtractedRelationship>,
}

impl GraphExtraction {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// Fold another extraction into this one.
    ///
    /// Entities are unique by name; a repeated entity contributes its
    /// properties to the first occurrence. Relationships are appended as-is.
    pub fn merge(&mut self, other: GraphExtraction) {
        for entity in other.entities {
            match self.entities.iter_mut().find(|e| e.name == entity.name) {
                Some(existing) => existing.properties.extend(entity.properties),
                None => self.entities.push(entity),
            }
        }
        self.relationships.extend(other.relationships);
    }
}

/// Relationship type as stored: upper case, spaces replaced by underscores,
/// anything outside `[A-Z0-9_]` dropped
pub fn normalize_rel_type(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Whether `key` can be spliced into a query as a property name
pub fn is_safe_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
