//! `POST /chat`: one message in, one reply out.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared_types::{ChatRequest, ChatResponse};
use tracing::{error, info, warn};

use super::{run_turn, timestamp, ApiState, PeerAddr};
use crate::error::GatewayError;
use crate::sessions::derive_client_id;

pub async fn chat(
    State(state): State<ApiState>,
    PeerAddr(peer): PeerAddr,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let client_id = derive_client_id(peer.ip(), peer.port());

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(
                client_id = %client_id,
                timestamp = %timestamp(),
                error = %rejection.body_text(),
                "rejected malformed chat request"
            );
            return GatewayError::BadRequest(rejection.body_text()).into_response();
        }
    };

    info!(
        client_id = %client_id,
        timestamp = %timestamp(),
        message = %request.message,
        "unary chat request"
    );

    let key = request
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("http:{}", peer.ip()));

    let context = state
        .sessions
        .unary_context(&key, || state.orchestrator.new_context())
        .await;

    match run_turn(state.orchestrator.clone(), context, request.message).await {
        Ok(reply) => {
            info!(
                client_id = %client_id,
                timestamp = %timestamp(),
                response = %reply,
                "unary chat response"
            );
            Json(ChatResponse::new(reply)).into_response()
        }
        Err(e) => {
            error!(client_id = %client_id, timestamp = %timestamp(), error = %e, "unary chat failed");
            e.into_response()
        }
    }
}
