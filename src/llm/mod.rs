//! Text-completion capability

pub mod openai;

pub use openai::OpenAiCompletionClient;

use crate::error::LlmError;
use async_trait::async_trait;

/// A language model that turns a system and a user prompt into text
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}
