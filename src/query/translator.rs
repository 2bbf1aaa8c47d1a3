//! Question -> Cypher translation with retry on failure

use crate::graph::{GraphStore, QueryParams, Record, SchemaIntrospector};
use crate::llm::CompletionClient;
use crate::metrics::METRICS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Error reported when every attempt failed
pub const EXHAUSTED_MESSAGE: &str = "Failed to generate valid Cypher query after all retries";

const SYSTEM_PROMPT: &str = "You are an expert at converting natural language questions to Cypher queries for Neo4j.

Graph Schema:
{schema}

Guidelines:
- Use MATCH for reading data
- Use proper WHERE clauses for filtering
- Return relevant nodes and relationships
- Use LIMIT to avoid returning too much data (default LIMIT 10)
- Ensure the query is syntactically correct
- Focus on Entity nodes with 'name' and 'type' properties

Return ONLY the Cypher query without any explanation or markdown formatting.";

/// Outcome of [`QueryTranslator::translate_and_execute`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAttemptResult {
    pub success: bool,
    /// The question that was translated
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cypher: Option<String>,
    #[serde(default)]
    pub data: Vec<Record>,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure of the final attempt when all attempts were used up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Outcome of a dry-run validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why an attempt did not produce rows; fed into the next prompt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptFeedback {
    Generation(String),
    EmptyCandidate,
    Execution(String),
    NoRows,
}

impl fmt::Display for AttemptFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFeedback::Generation(e) => write!(f, "query generation failed: {}", e),
            AttemptFeedback::EmptyCandidate => write!(f, "no query was produced"),
            AttemptFeedback::Execution(e) => write!(f, "the query failed with error: {}", e),
            AttemptFeedback::NoRows => write!(f, "the query returned no rows"),
        }
    }
}

/// Remove markdown code fences and surrounding whitespace
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .replace("```cypher", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Translates questions into Cypher and executes them, retrying on failure
pub struct QueryTranslator {
    store: Arc<dyn GraphStore>,
    llm: Arc<dyn CompletionClient>,
    schema: SchemaIntrospector,
}

impl QueryTranslator {
    pub fn new(store: Arc<dyn GraphStore>, llm: Arc<dyn CompletionClient>) -> Self {
        let schema = SchemaIntrospector::new(store.clone());
        Self { store, llm, schema }
    }

    fn system_prompt(schema: &str, feedback: Option<&AttemptFeedback>) -> String {
        let mut prompt = SYSTEM_PROMPT.replace("{schema}", schema);
        if let Some(feedback) = feedback {
            prompt.push_str("\n\nPrevious attempt failed. Try a simpler or different approach.");
            prompt.push_str(&format!("\nLast failure: {}", feedback));
        }
        prompt
    }

    async fn generate(
        &self,
        question: &str,
        schema: &str,
        feedback: Option<&AttemptFeedback>,
    ) -> Result<String, AttemptFeedback> {
        let system = Self::system_prompt(schema, feedback);
        let user = format!("Question: {}\n\nGenerate a Cypher query:", question);

        match self.llm.complete(&system, &user).await {
            Ok(raw) => {
                let cypher = strip_code_fences(&raw);
                if cypher.is_empty() {
                    Err(AttemptFeedback::EmptyCandidate)
                } else {
                    debug!("Generated Cypher: {}", cypher);
                    Ok(cypher)
                }
            }
            Err(e) => {
                error!("Error generating Cypher: {}", e);
                Err(AttemptFeedback::Generation(e.to_string()))
            }
        }
    }

    /// Translate `question` and execute it, making at most `max_attempts` attempts.
    ///
    /// An attempt succeeds when the query runs without error and returns at
    /// least one row. There is no delay between attempts.
    pub async fn translate_and_execute(&self, question: &str, max_attempts: usize) -> QueryAttemptResult {
        info!("Processing query: {}", question);

        let schema = self.schema.describe().await;
        let mut feedback: Option<AttemptFeedback> = None;

        for attempt in 0..max_attempts {
            info!("Attempt {}/{}", attempt + 1, max_attempts);

            let cypher = match self.generate(question, &schema, feedback.as_ref()).await {
                Ok(cypher) => cypher,
                Err(reason) => {
                    METRICS.record_query_attempt("generation_error");
                    feedback = Some(reason);
                    continue;
                }
            };

            match self.store.execute(&cypher, QueryParams::new()).await {
                Ok(rows) if !rows.is_empty() => {
                    info!("Query successful on attempt {}", attempt + 1);
                    METRICS.record_query_attempt("success");
                    METRICS.record_translation(true);
                    return QueryAttemptResult {
                        success: true,
                        query: question.to_string(),
                        cypher: Some(cypher),
                        data: rows,
                        attempts: attempt + 1,
                        error: None,
                        last_error: None,
                    };
                }
                Ok(_) => {
                    warn!("Query returned no results on attempt {}", attempt + 1);
                    METRICS.record_query_attempt("empty");
                    feedback = Some(AttemptFeedback::NoRows);
                }
                Err(e) => {
                    warn!("Query failed on attempt {}: {}", attempt + 1, e);
                    METRICS.record_query_attempt("error");
                    feedback = Some(AttemptFeedback::Execution(e.to_string()));
                }
            }
        }

        METRICS.record_translation(false);
        QueryAttemptResult {
            success: false,
            query: question.to_string(),
            cypher: None,
            data: Vec::new(),
            attempts: max_attempts,
            error: Some(EXHAUSTED_MESSAGE.to_string()),
            last_error: feedback.map(|f| f.to_string()),
        }
    }

    /// Check a query with `EXPLAIN` without running it
    pub async fn validate(&self, cypher: &str) -> QueryValidation {
        let explain = format!("EXPLAIN {}", cypher.trim());
        match self.store.execute(&explain, QueryParams::new()).await {
            Ok(_) => QueryValidation {
                valid: true,
                message: Some("Query is syntactically valid".to_string()),
                error: None,
            },
            Err(e) => QueryValidation {
                valid: false,
                message: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::graph::{GraphValue, MemoryGraphStore};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted completions and records the system prompts it saw
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedLlm {
        async fn complete(&self, system: &str, _user: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(system.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("MATCH (n) RETURN n".to_string()))
        }
    }

    fn one_row() -> Vec<Record> {
        vec![[("name".to_string(), GraphValue::from("LinkedIn"))].into_iter().collect()]
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(
            strip_code_fences("```cypher\nMATCH (n) RETURN n LIMIT 10\n```"),
            "MATCH (n) RETURN n LIMIT 10"
        );
        assert_eq!(strip_code_fences("  ```\n```  "), "");
    }

    #[tokio::test]
    async fn test_success_on_second_attempt_after_error() {
        let store = Arc::new(MemoryGraphStore::new());
        store.fail_on("MATC (n) RETURN n", "Neo.ClientError.Statement.SyntaxError", "Invalid input 'MATC'");
        store.respond_to("MATCH (e:Entity) RETURN e.name AS name LIMIT 10", one_row());

        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("MATC (n) RETURN n".to_string()),
            Ok("```cypher\nMATCH (e:Entity) RETURN e.name AS name LIMIT 10\n```".to_string()),
        ]));
        let translator = QueryTranslator::new(store.clone(), llm.clone());

        let result = translator.translate_and_execute("Who owns LinkedIn?", 3).await;

        assert!(result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.data.len(), 1);
        assert_eq!(llm.calls(), 2);

        let prompts = llm.prompts.lock().unwrap();
        assert!(!prompts[0].contains("Previous attempt failed"));
        assert!(prompts[1].contains("Previous attempt failed. Try a simpler or different approach."));
        assert!(prompts[1].contains("Invalid input 'MATC'"));
    }

    #[tokio::test]
    async fn test_exhaustion_is_bounded() {
        let store = Arc::new(MemoryGraphStore::new());
        store.respond_to("MATCH (n) RETURN n", vec![]);
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let translator = QueryTranslator::new(store.clone(), llm.clone());

        let result = translator.translate_and_execute("Anything?", 3).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.error.as_deref(), Some(EXHAUSTED_MESSAGE));
        assert_eq!(result.last_error.as_deref(), Some("the query returned no rows"));
        assert_eq!(llm.calls(), 3);
        assert_eq!(store.executed_queries().len(), 3);
    }

    #[tokio::test]
    async fn test_generation_errors_skip_the_store() {
        let store = Arc::new(MemoryGraphStore::new());
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(LlmError::NetworkError("connection reset".to_string())),
            Ok("```".to_string()),
        ]));
        let translator = QueryTranslator::new(store.clone(), llm.clone());

        let result = translator.translate_and_execute("Anything?", 2).await;

        assert!(!result.success);
        assert_eq!(result.last_error.as_deref(), Some("no query was produced"));
        assert!(store.executed_queries().is_empty());
        assert!(llm.prompts.lock().unwrap()[1].contains("connection reset"));
    }

    #[tokio::test]
    async fn test_zero_attempts() {
        let store = Arc::new(MemoryGraphStore::new());
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let translator = QueryTranslator::new(store, llm.clone());

        let result = translator.translate_and_execute("Anything?", 0).await;
        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_validate() {
        let store = Arc::new(MemoryGraphStore::new());
        store.fail_on("MATC (n)", "Neo.ClientError.Statement.SyntaxError", "Invalid input");
        let translator = QueryTranslator::new(store.clone(), Arc::new(ScriptedLlm::new(vec![])));

        let ok = translator.validate("MATCH (n) RETURN n").await;
        assert!(ok.valid);
        assert_eq!(ok.message.as_deref(), Some("Query is syntactically valid"));

        let bad = translator.validate("MATC (n)").await;
        assert!(!bad.valid);
        assert!(bad.error.unwrap().contains("Invalid input"));
        assert_eq!(store.executed_queries()[0], "EXPLAIN MATCH (n) RETURN n");
    }
}
