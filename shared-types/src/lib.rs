//! Shared types between the gateway and its clients
//!
//! These types are used by both:
//! - the gateway (HTTP + WebSocket server)
//! - the chat client (reconnecting WebSocket counterpart)
//!
//! Serializable with serde for JSON over WebSocket/HTTP

use serde::{Deserialize, Serialize};

// ============================================================================
// Wire Protocol
// ============================================================================

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,

    /// Optional conversation key for unary callers that want continuity
    /// across requests. Absent keys fall back to the caller's address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
        }
    }
}

/// Successful reply, used both as the `POST /chat` body and as the single
/// JSON frame sent per inbound duplex frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

impl ChatResponse {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

/// Error body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Conversation
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a conversation history. Serializes to the
/// `{"role": ..., "content": ...}` shape chat-completion APIs expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Web Search
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchSource {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Normalized result of one search call. Not retained after formatting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub sources: Vec<SearchSource>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The direct answer, if the provider produced a non-blank one
    pub fn direct_answer(&self) -> Option<&str> {
        self.answer
            .as_deref()
            .map(str::trim)
            .filter(|answer| !answer.is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================
