//! Ground truth resolution against an external text source

use super::models::{GroundTruth, GroundTruthRecord};
use crate::error::LookupError;
use crate::metrics::METRICS;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// A page returned by a [`TextLookup`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupPage {
    pub title: String,
    pub text: String,
    pub url: String,
}

/// Encyclopedic text source
#[async_trait]
pub trait TextLookup: Send + Sync {
    /// Page titles matching `query`, best first
    async fn search(&self, query: &str) -> Result<Vec<String>, LookupError>;

    /// The page with exactly this title (no suggestion or fuzzy matching)
    async fn fetch(&self, title: &str) -> Result<LookupPage, LookupError>;
}

/// Resolves entity names to ground-truth records
pub struct GroundTruthResolver {
    lookup: Arc<dyn TextLookup>,
    max_entities: usize,
    summary_chars: usize,
}

impl GroundTruthResolver {
    pub fn new(lookup: Arc<dyn TextLookup>, max_entities: usize, summary_chars: usize) -> Self {
        Self {
            lookup,
            max_entities,
            summary_chars,
        }
    }

    async fn resolve_one(&self, name: &str) -> Result<GroundTruthRecord, LookupError> {
        let titles = self.lookup.search(name).await?;
        let Some(title) = titles.into_iter().next() else {
            return Err(LookupError::NotFound(format!("No matching page found for '{}'", name)));
        };

        let page = self.lookup.fetch(&title).await?;
        Ok(GroundTruthRecord::Found {
            title: page.title,
            summary: truncate_chars(&page.text, self.summary_chars),
            url: page.url,
        })
    }

    /// Records for the first `max_entities` names, in order.
    ///
    /// Lookup failures become error records and never stop the batch.
    pub async fn resolve(&self, names: &[String]) -> GroundTruth {
        let mut ground_truth = GroundTruth::new();

        for name in names.iter().take(self.max_entities) {
            let record = match self.resolve_one(name).await {
                Ok(record) => {
                    info!("Retrieved ground truth for: {}", name);
                    record
                }
                Err(e) => {
                    warn!("Could not retrieve ground truth for {}: {}", name, e);
                    let message = match e {
                        LookupError::NotFound(message) => message,
                        other => other.to_string(),
                    };
                    GroundTruthRecord::failed(message)
                }
            };
            METRICS.record_ground_truth(record.is_found());
            ground_truth.insert(name.clone(), record);
        }

        ground_truth
    }
}

/// First `max` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves pages for known titles and records searches
    struct FakeLookup {
        searches: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextLookup for FakeLookup {
        async fn search(&self, query: &str) -> Result<Vec<String>, LookupError> {
            self.searches.lock().unwrap().push(query.to_string());
            match query {
                "Nothing" => Ok(vec![]),
                "Offline" => Err(LookupError::RequestFailed("connection refused".to_string())),
                "Mercury" => Ok(vec!["Mercury".to_string()]),
                other => Ok(vec![format!("{} (page)", other)]),
            }
        }

        async fn fetch(&self, title: &str) -> Result<LookupPage, LookupError> {
            if title == "Mercury" {
                return Err(LookupError::Disambiguation {
                    title: title.to_string(),
                    options: "Mercury (planet), Mercury (element)".to_string(),
                });
            }
            Ok(LookupPage {
                title: title.to_string(),
                text: "é".repeat(600),
                url: format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")),
            })
        }
    }

    fn resolver() -> (GroundTruthResolver, Arc<FakeLookup>) {
        let lookup = Arc::new(FakeLookup {
            searches: Mutex::new(Vec::new()),
        });
        (GroundTruthResolver::new(lookup.clone(), 5, 500), lookup)
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_only_first_five_entities() {
        let (resolver, lookup) = resolver();
        let names: Vec<String> = (1..=7).map(|i| format!("Entity{}", i)).collect();

        let ground_truth = resolver.resolve(&names).await;

        assert_eq!(ground_truth.len(), 5);
        assert_eq!(lookup.searches.lock().unwrap().len(), 5);
        assert_eq!(ground_truth.keys().next().map(String::as_str), Some("Entity1"));
    }

    #[tokio::test]
    async fn test_failures_become_error_records() {
        let (resolver, _) = resolver();
        let names = vec![
            "Nothing".to_string(),
            "Offline".to_string(),
            "Mercury".to_string(),
            "LinkedIn".to_string(),
        ];

        let ground_truth = resolver.resolve(&names).await;

        assert_eq!(
            ground_truth["Nothing"],
            GroundTruthRecord::failed("No matching page found for 'Nothing'")
        );
        assert!(!ground_truth["Offline"].is_found());
        assert!(!ground_truth["Mercury"].is_found());

        let linkedin = &ground_truth["LinkedIn"];
        assert!(linkedin.is_found());
        assert_eq!(linkedin.summary().unwrap().chars().count(), 500);
    }
}
