//! Provider adapters
//!
//! Boundary wrappers around the two external APIs the orchestrator consumes.
//! Each adapter performs a single call with no retry; any failure is reported
//! as a [`ProviderError`] and recovered by the caller.

use async_trait::async_trait;
use shared_types::{ConversationTurn, SearchResult};

pub mod completion;
pub mod search;

pub use completion::OpenAiCompletion;
pub use search::TavilySearch;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("missing API key env var: {0}")]
    MissingApiKey(String),
    #[error("provider request failed ({0}): {1}")]
    Request(String, String),
    #[error("provider response parse failed ({0}): {1}")]
    Parse(String, String),
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Run one search. An empty `sources` list is a valid result, distinct
    /// from a failure.
    async fn search(&self, query: &str) -> Result<SearchResult, ProviderError>;
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Generate the next assistant reply for the full ordered history.
    async fn complete(&self, history: &[ConversationTurn]) -> Result<String, ProviderError>;
}

/// Build the shared HTTP client used by both adapters.
pub fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Request("http_client".to_string(), e.to_string()))
}
