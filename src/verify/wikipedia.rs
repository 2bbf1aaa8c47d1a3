//! Wikipedia adapter over the MediaWiki action API

use super::ground_truth::{LookupPage, TextLookup};
use crate::config::GroundTruthConfig;
use crate::error::LookupError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Text lookup backed by `{base_url}/w/api.php`
pub struct WikipediaClient {
    client: Client,
    api_url: String,
}

impl WikipediaClient {
    pub fn new(config: &GroundTruthConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LookupError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            api_url: format!("{}/w/api.php", config.base_url.trim_end_matches('/')),
        })
    }

    async fn get<T: DeserializeOwned>(&self, query: &[(&str, &str)]) -> Result<T, LookupError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(query)
            .send()
            .await
            .map_err(|e| LookupError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::RequestFailed(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TextLookup for WikipediaClient {
    async fn search(&self, query: &str) -> Result<Vec<String>, LookupError> {
        debug!("Wikipedia search: {}", query);
        let response: SearchResponse = self
            .get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", "1"),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .await?;

        Ok(response.query.search.into_iter().map(|hit| hit.title).collect())
    }

    async fn fetch(&self, title: &str) -> Result<LookupPage, LookupError> {
        debug!("Wikipedia fetch: {}", title);
        let response: PageResponse = self
            .get(&[
                ("action", "query"),
                ("prop", "extracts|info|pageprops|links"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("inprop", "url"),
                ("pllimit", "10"),
                ("titles", title),
                ("redirects", "1"),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .await?;

        let page = response
            .query
            .pages
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::InvalidResponse("no pages in response".to_string()))?;

        if page.missing || page.invalid {
            return Err(LookupError::NotFound(format!("Page '{}' does not exist", title)));
        }

        if page.pageprops.disambiguation.is_some() {
            let options = page
                .links
                .into_iter()
                .map(|link| link.title)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(LookupError::Disambiguation {
                title: page.title,
                options,
            });
        }

        Ok(LookupPage {
            title: page.title,
            text: page.extract.unwrap_or_default(),
            url: page.fullurl.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: SearchQuery,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    query: PageQuery,
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    fullurl: Option<String>,
    #[serde(default)]
    pageprops: PageProps,
    #[serde(default)]
    links: Vec<PageLink>,
}

#[derive(Debug, Default, Deserialize)]
struct PageProps {
    #[serde(default)]
    disambiguation: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PageLink {
    title: String,
}
