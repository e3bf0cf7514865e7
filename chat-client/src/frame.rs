use serde_json::Value;
use shared_types::ChatResponse;

/// Decoded server frame. Plain text is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// `{"response": "..."}` with a non-empty string
    Structured(String),
    /// Anything else, shown verbatim
    PlainText(String),
}

impl InboundMessage {
    pub fn into_text(self) -> String {
        match self {
            Self::Structured(text) | Self::PlainText(text) => text,
        }
    }
}

pub fn parse_inbound(raw: &str) -> InboundMessage {
    let reply = serde_json::from_str::<Value>(raw)
        .ok()
        .filter(Value::is_object)
        .and_then(|value| serde_json::from_value::<ChatResponse>(value).ok());

    match reply {
        Some(ChatResponse { response }) if !response.is_empty() => {
            InboundMessage::Structured(response)
        }
        _ => InboundMessage::PlainText(raw.to_string()),
    }
}
