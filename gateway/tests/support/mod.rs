//! Scripted provider doubles shared by the gateway integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gateway::api::ApiState;
use gateway::config::Config;
use gateway::providers::{CompletionProvider, ProviderError, SearchProvider};
use shared_types::{ConversationTurn, Role, SearchResult, SearchSource};

/// Replies from a queue, then echoes the latest user turn.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<Vec<ConversationTurn>>>,
}

impl ScriptedCompletion {
    pub fn echo() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(times: usize) -> Arc<Self> {
        Self::scripted((0..times).map(|_| Err(provider_down("completion"))).collect())
    }

    pub fn calls(&self) -> Vec<Vec<ConversationTurn>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted-completion"
    }

    async fn complete(&self, history: &[ConversationTurn]) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(history.to_vec());
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        let last_user = history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.content.clone())
            .unwrap_or_default();
        Ok(format!("echo: {last_user}"))
    }
}

/// Returns a fixed result (or a failure) and records every query.
pub struct ScriptedSearch {
    result: Option<SearchResult>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn returning(result: SearchResult) -> Arc<Self> {
        Arc::new(Self {
            result: Some(result),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: None,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted-search"
    }

    async fn search(&self, query: &str) -> Result<SearchResult, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.result {
            Some(result) => Ok(SearchResult {
                query: query.to_string(),
                ..result.clone()
            }),
            None => Err(provider_down("search")),
        }
    }
}

pub fn provider_down(name: &str) -> ProviderError {
    ProviderError::Request(name.to_string(), "status 503: unavailable".to_string())
}

pub fn sample_results(answer: Option<&str>) -> SearchResult {
    SearchResult {
        query: String::new(),
        answer: answer.map(ToString::to_string),
        sources: vec![
            SearchSource {
                title: "Tokio".to_string(),
                url: "https://tokio.rs".to_string(),
                content: "An asynchronous runtime for Rust".to_string(),
            },
            SearchSource {
                title: "Axum".to_string(),
                url: "https://docs.rs/axum".to_string(),
                content: "Ergonomic web framework".to_string(),
            },
        ],
    }
}

pub fn test_state(
    completion: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchProvider>,
) -> ApiState {
    gateway::build_state(&Config::default(), completion, search).expect("valid test config")
}
