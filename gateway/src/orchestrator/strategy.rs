//! Response strategies forming the fallback chain.
//!
//! Each strategy either produces a reply or reports why it could not. The
//! orchestrator walks the chain in order and stops at the first success.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::ConversationTurn;

use super::format::format_fallback_answer;
use crate::providers::{CompletionProvider, SearchProvider};

pub const DEFAULT_REPLY: &str =
    "I'm having trouble generating a response right now. Would you like to try a web search?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Success(String),
    Failure(String),
}

/// Input shared by every strategy for one user message.
#[derive(Debug, Clone, Copy)]
pub struct StrategyRequest<'a> {
    /// Raw user text
    pub input: &'a str,
    /// Full ordered history, already including `input` as the last user turn
    pub history: &'a [ConversationTurn],
}

#[async_trait]
pub trait ResponseStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a successful reply becomes an assistant turn in the history.
    fn records_reply(&self) -> bool {
        false
    }

    async fn respond(&self, request: StrategyRequest<'_>) -> StrategyOutcome;
}

pub type StrategyChain = Vec<Arc<dyn ResponseStrategy>>;

/// Ask the completion provider with the whole conversation.
pub struct CompletionStrategy {
    provider: Arc<dyn CompletionProvider>,
}

impl CompletionStrategy {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ResponseStrategy for CompletionStrategy {
    fn name(&self) -> &'static str {
        "completion"
    }

    fn records_reply(&self) -> bool {
        true
    }

    async fn respond(&self, request: StrategyRequest<'_>) -> StrategyOutcome {
        match self.provider.complete(request.history).await {
            Ok(reply) if !reply.trim().is_empty() => StrategyOutcome::Success(reply),
            Ok(_) => StrategyOutcome::Failure(format!(
                "{} returned an empty reply",
                self.provider.name()
            )),
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "completion provider failed"
                );
                StrategyOutcome::Failure(e.to_string())
            }
        }
    }
}

/// Search the web with the raw user text.
pub struct SearchFallbackStrategy {
    provider: Arc<dyn SearchProvider>,
    max_snippets: usize,
}

impl SearchFallbackStrategy {
    pub fn new(provider: Arc<dyn SearchProvider>, max_snippets: usize) -> Self {
        Self {
            provider,
            max_snippets,
        }
    }
}

#[async_trait]
impl ResponseStrategy for SearchFallbackStrategy {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn respond(&self, request: StrategyRequest<'_>) -> StrategyOutcome {
        match self.provider.search(request.input).await {
            Ok(result) if !result.is_empty() => {
                StrategyOutcome::Success(format_fallback_answer(&result, self.max_snippets))
            }
            Ok(_) => StrategyOutcome::Failure("search returned no results".to_string()),
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "search fallback failed"
                );
                StrategyOutcome::Failure(e.to_string())
            }
        }
    }
}

/// Last link of the chain; always succeeds.
pub struct DefaultReplyStrategy;

#[async_trait]
impl ResponseStrategy for DefaultReplyStrategy {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn respond(&self, _request: StrategyRequest<'_>) -> StrategyOutcome {
        StrategyOutcome::Success(DEFAULT_REPLY.to_string())
    }
}

/// `[completion, search, default]`
pub fn default_chain(
    completion: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchProvider>,
    max_snippets: usize,
) -> StrategyChain {
    vec![
        Arc::new(CompletionStrategy::new(completion)),
        Arc::new(SearchFallbackStrategy::new(search, max_snippets)),
        Arc::new(DefaultReplyStrategy),
    ]
}
