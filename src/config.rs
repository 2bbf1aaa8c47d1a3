//! Application configuration
//!
//! Layered: built-in defaults, `config/default.toml`, the file named by
//! `TRUTH_ENGINE_CONFIG`, `TRUTH_ENGINE__*` environment variables and
//! finally the well-known provider variables (`OPENAI_API_KEY`, `NEO4J_URI`, ...).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub ground_truth: GroundTruthConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = ::config::Config::builder()
            .add_source(::config::File::with_name("config/default").required(false));

        if let Ok(path) = std::env::var("TRUTH_ENGINE_CONFIG") {
            debug!("Loading configuration file {}", path);
            builder = builder.add_source(::config::File::with_name(&path).required(true));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("TRUTH_ENGINE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config.from_env())
    }

    /// Parse configuration from a TOML string (no environment applied)
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(raw, ::config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Apply the well-known provider environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            if !val.is_empty() {
                self.llm.api_key = Some(val);
            }
        }

        if let Ok(val) = std::env::var("OPENAI_MODEL") {
            self.llm.model = val;
        }

        if let Ok(val) = std::env::var("OPENAI_API_URL") {
            self.llm.api_url = val;
        }

        if let Ok(val) = std::env::var("NEO4J_URI") {
            self.graph.uri = val;
        }

        if let Ok(val) = std::env::var("NEO4J_USERNAME") {
            self.graph.username = val;
        }

        if let Ok(val) = std::env::var("NEO4J_PASSWORD") {
            self.graph.password = Some(val);
        }

        if let Ok(val) = std::env::var("NEO4J_DATABASE") {
            self.graph.database = val;
        }

        if let Ok(val) = std::env::var("WIKIPEDIA_URL") {
            self.ground_truth.base_url = val;
        }

        if let Ok(val) = std::env::var("MAX_RETRIES") {
            if let Ok(attempts) = val.parse() {
                self.pipeline.max_attempts = attempts;
            }
        }

        self
    }
}

/// Text-completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Transport-level retries for a single completion
    #[serde(default = "default_llm_retries")]
    pub max_retries: usize,

    /// Base backoff in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_api_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_model() -> String { "gpt-4-turbo-preview".to_string() }
fn default_temperature() -> f32 { 0.0 }
fn default_max_tokens() -> u32 { 1024 }
fn default_llm_timeout() -> u64 { 60 }
fn default_llm_retries() -> usize { 2 }
fn default_retry_backoff_ms() -> u64 { 200 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Graph store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Base URL of the Neo4j HTTP endpoint
    #[serde(default = "default_graph_uri")]
    pub uri: String,

    #[serde(default = "default_graph_username")]
    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_graph_database")]
    pub database: String,

    #[serde(default = "default_graph_timeout")]
    pub timeout_secs: u64,

    /// Capacity of the entity name -> node id cache
    #[serde(default = "default_entity_cache_size")]
    pub entity_cache_size: u64,
}

fn default_graph_uri() -> String { "http://localhost:7474".to_string() }
fn default_graph_username() -> String { "neo4j".to_string() }
fn default_graph_database() -> String { "neo4j".to_string() }
fn default_graph_timeout() -> u64 { 30 }
fn default_entity_cache_size() -> u64 { 10_000 }

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_graph_uri(),
            username: default_graph_username(),
            password: None,
            database: default_graph_database(),
            timeout_secs: default_graph_timeout(),
            entity_cache_size: default_entity_cache_size(),
        }
    }
}

impl GraphConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// External text lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthConfig {
    #[serde(default = "default_wikipedia_url")]
    pub base_url: String,

    #[serde(default = "default_lookup_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_wikipedia_url() -> String { "https://en.wikipedia.org".to_string() }
fn default_lookup_timeout() -> u64 { 10 }
fn default_user_agent() -> String { format!("truth-engine/{}", env!("CARGO_PKG_VERSION")) }

impl Default for GroundTruthConfig {
    fn default() -> Self {
        Self {
            base_url: default_wikipedia_url(),
            timeout_secs: default_lookup_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl GroundTruthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Bounds applied by the fact-checking pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Query synthesis attempts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Maximum nodes kept in an extracted subgraph
    #[serde(default = "default_node_cap")]
    pub node_cap: usize,

    /// Node matches kept per candidate entity name
    #[serde(default = "default_max_matches")]
    pub max_matches_per_entity: usize,

    /// Entities resolved against the text lookup per request
    #[serde(default = "default_max_gt_entities")]
    pub max_ground_truth_entities: usize,

    /// Facts included in the comparison prompt
    #[serde(default = "default_max_facts")]
    pub max_facts_compared: usize,

    /// Characters kept from each ground-truth summary
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,

    #[serde(default = "default_path_max_depth")]
    pub path_max_depth: usize,
}

fn default_max_attempts() -> usize { 3 }
fn default_node_cap() -> usize { 50 }
fn default_max_matches() -> usize { 5 }
fn default_max_gt_entities() -> usize { 5 }
fn default_max_facts() -> usize { 10 }
fn default_summary_chars() -> usize { 500 }
fn default_path_max_depth() -> usize { 5 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            node_cap: default_node_cap(),
            max_matches_per_entity: default_max_matches(),
            max_ground_truth_entities: default_max_gt_entities(),
            max_facts_compared: default_max_facts(),
            summary_chars: default_summary_chars(),
            path_max_depth: default_path_max_depth(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body in bytes
    #[serde(default = "default_body_limit")]
    pub max_body_bytes: usize,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8081 }
fn default_body_limit() -> usize { 2 * 1024 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.pipeline.node_cap, 50);
        assert_eq!(config.pipeline.max_ground_truth_entities, 5);
        assert_eq!(config.pipeline.max_facts_compared, 10);
        assert_eq!(config.graph.database, "neo4j");
        assert_eq!(config.server.port, 8081);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let raw = r#"
            [pipeline]
            max_attempts = 5

            [graph]
            uri = "http://graph:7474"
        "#;

        let config = Config::from_toml_str(raw).unwrap();
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(config.pipeline.node_cap, 50);
        assert_eq!(config.graph.uri, "http://graph:7474");
        assert_eq!(config.graph.username, "neo4j");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_duration_conversions() {
        let config = Config::default();
        assert_eq!(config.llm.timeout(), Duration::from_secs(60));
        assert_eq!(config.llm.retry_backoff(), Duration::from_millis(200));
        assert_eq!(config.graph.timeout(), Duration::from_secs(30));
        assert_eq!(config.ground_truth.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_bind_addr() {
        let server = ServerConfig::default();
        assert_eq!(server.bind_addr(), "0.0.0.0:8081");
    }
}
