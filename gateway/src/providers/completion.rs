use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use shared_types::ConversationTurn;

use super::{CompletionProvider, ProviderError};

const PROVIDER: &str = "openai";

/// OpenAI-compatible chat-completion adapter.
pub struct OpenAiCompletion {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    max_tokens: u32,
}

impl OpenAiCompletion {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, history: &[ConversationTurn]) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: history,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Request(PROVIDER.to_string(), e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request(
                PROVIDER.to_string(),
                format!("status {}: {}", status, body),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(PROVIDER.to_string(), e.to_string()))?;

        extract_reply(&payload)
    }
}

/// Pull `choices[0].message.content` out of a completion response.
pub fn extract_reply(payload: &Value) -> Result<String, ProviderError> {
    payload
        .get("choices")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("message"))
        .and_then(|v| v.get("content"))
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| {
            ProviderError::Parse(
                PROVIDER.to_string(),
                "missing choices[0].message.content".to_string(),
            )
        })
}
