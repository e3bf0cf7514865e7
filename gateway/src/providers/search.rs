use async_trait::async_trait;
use serde_json::Value;
use shared_types::{SearchResult, SearchSource};

use super::{ProviderError, SearchProvider};

const PROVIDER: &str = "tavily";

/// Tavily search API adapter (`POST /search` with a bearer key).
pub struct TavilySearch {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_results: u32,
}

impl TavilySearch {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        max_results: u32,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key,
            max_results,
        }
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> Result<SearchResult, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingApiKey("TAVILY_API_KEY".to_string()))?;

        let body = serde_json::json!({
            "query": query,
            "max_results": self.max_results,
            "include_answer": true,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(provider = PROVIDER, error = %e, "search request failed");
                ProviderError::Request(PROVIDER.to_string(), e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = PROVIDER, %status, "search returned non-success status");
            return Err(ProviderError::Request(
                PROVIDER.to_string(),
                format!("status {}: {}", status, body),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(PROVIDER.to_string(), e.to_string()))?;

        parse_search_payload(query, &payload)
    }
}

/// Normalize a Tavily response body into a [`SearchResult`].
pub fn parse_search_payload(query: &str, payload: &Value) -> Result<SearchResult, ProviderError> {
    let results = payload
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            ProviderError::Parse(PROVIDER.to_string(), "missing results array".to_string())
        })?;

    let sources = results
        .iter()
        .map(|row| SearchSource {
            title: row
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Untitled")
                .to_string(),
            url: row
                .get("url")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .trim()
                .to_string(),
            content: row
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
        .collect();

    Ok(SearchResult {
        query: payload
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or(query)
            .to_string(),
        answer: payload
            .get("answer")
            .and_then(|v| v.as_str())
            .map(ToString::to_string),
        sources,
    })
}
