//! Response orchestration
//!
//! Turns one user message into one reply:
//!
//! 1. Messages containing an explicit search trigger go straight to the
//!    search provider and never touch the conversation history.
//! 2. The first ordinary message of a conversation gets the fixed greeting.
//! 3. Everything else walks the fallback chain (completion, search, default)
//!    until a strategy succeeds.
//!
//! Nothing here fails outward: provider errors fall through the chain and an
//! unexpected panic becomes a fixed apology.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::config::Config;
use crate::providers::{CompletionProvider, SearchProvider};

pub mod context;
pub mod format;
pub mod strategy;
pub mod triggers;

pub use context::ConversationContext;
pub use strategy::{
    default_chain, ResponseStrategy, StrategyChain, StrategyOutcome, StrategyRequest,
    DEFAULT_REPLY,
};
pub use triggers::{TriggerError, TriggerMatcher, TriggerTable};

pub const GREETING: &str = "Hello! I'm Eliza, your AI assistant. How can I help you today?";
pub const GENERATION_APOLOGY: &str = "I'm having trouble generating a response right now.";

pub struct Orchestrator {
    triggers: TriggerTable,
    search: Arc<dyn SearchProvider>,
    chain: StrategyChain,
    system_prompt: String,
}

impl Orchestrator {
    pub fn new(
        triggers: TriggerTable,
        search: Arc<dyn SearchProvider>,
        chain: StrategyChain,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            triggers,
            search,
            chain,
            system_prompt: system_prompt.into(),
        }
    }

    /// Wire the default `[completion, search, default]` chain from config.
    pub fn from_config(
        config: &Config,
        completion: Arc<dyn CompletionProvider>,
        search: Arc<dyn SearchProvider>,
    ) -> Result<Self, TriggerError> {
        let triggers = TriggerTable::from_phrases(&config.search_triggers)?;
        let chain = default_chain(completion, search.clone(), config.fallback_snippets);
        Ok(Self::new(triggers, search, chain, config.system_prompt.clone()))
    }

    pub fn new_context(&self) -> ConversationContext {
        ConversationContext::new(self.system_prompt.clone())
    }

    pub fn triggers(&self) -> &TriggerTable {
        &self.triggers
    }

    pub fn is_search_trigger(&self, input: &str) -> bool {
        self.triggers.is_search_trigger(input)
    }

    /// Query for a triggered message; untriggered input is returned unchanged.
    pub fn extract_search_query(&self, input: &str) -> String {
        self.triggers
            .extract_search_query(input)
            .unwrap_or_else(|| input.to_string())
    }

    /// Produce the reply for `input` within `context`. Never fails.
    pub async fn handle(&self, context: &mut ConversationContext, input: &str) -> String {
        match AssertUnwindSafe(self.dispatch(context, input))
            .catch_unwind()
            .await
        {
            Ok(reply) => reply,
            Err(_) => {
                tracing::error!("response generation panicked; replying with apology");
                GENERATION_APOLOGY.to_string()
            }
        }
    }

    async fn dispatch(&self, context: &mut ConversationContext, input: &str) -> String {
        match self.triggers.extract_search_query(input) {
            Some(query) => self.explicit_search(&query).await,
            None => self.generate_chat_response(context, input).await,
        }
    }

    /// Search-trigger path. Bypasses the completion provider and the history.
    pub async fn explicit_search(&self, query: &str) -> String {
        if query.is_empty() {
            return format::format_no_results(query);
        }

        tracing::info!(provider = self.search.name(), query, "explicit web search");
        match self.search.search(query).await {
            Ok(result) if !result.is_empty() => format::format_search_results(&result),
            Ok(_) => format::format_no_results(query),
            Err(e) => {
                tracing::warn!(provider = self.search.name(), error = %e, "explicit web search failed");
                format::format_no_results(query)
            }
        }
    }

    pub async fn generate_chat_response(
        &self,
        context: &mut ConversationContext,
        input: &str,
    ) -> String {
        if context.begin() {
            return GREETING.to_string();
        }

        context.push_user(input);

        for strategy in &self.chain {
            let request = StrategyRequest {
                input,
                history: context.turns(),
            };
            match strategy.respond(request).await {
                StrategyOutcome::Success(reply) => {
                    if strategy.records_reply() {
                        context.push_assistant(reply.clone());
                    }
                    tracing::debug!(strategy = strategy.name(), "response strategy succeeded");
                    return reply;
                }
                StrategyOutcome::Failure(reason) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        reason = %reason,
                        "response strategy failed"
                    );
                }
            }
        }

        DEFAULT_REPLY.to_string()
    }
}
