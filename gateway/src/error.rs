use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared_types::ErrorResponse;

/// Fixed text every caller sees in place of an internal failure.
pub const APOLOGY: &str = "I apologize, but I encountered an error. Please try again.";

/// Request-path failures. None of them leak their detail to the caller.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("origin rejected: {}", .0.as_deref().unwrap_or("<missing>"))]
    OriginRejected(Option<String>),
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            // Handshake refusal carries no body.
            Self::OriginRejected(_) => StatusCode::FORBIDDEN.into_response(),
            Self::BadRequest(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: APOLOGY.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Failures that stop the process before it starts serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("missing credential: {0} is not set and no terminal is available to prompt for it")]
    MissingCredential(&'static str),
    #[error("invalid credential for {name}: {reason}")]
    InvalidCredential { name: &'static str, reason: String },
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_rejection_is_forbidden_without_body() {
        let response = GatewayError::OriginRejected(Some("http://evil.com".into())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_internal_errors_map_to_apology_status() {
        let response = GatewayError::BadRequest("missing field".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            GatewayError::OriginRejected(None).to_string(),
            "origin rejected: <missing>"
        );
        assert!(StartupError::MissingCredential("OPENAI_API_KEY")
            .to_string()
            .contains("OPENAI_API_KEY"));
    }
}
