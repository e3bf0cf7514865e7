//! HTTP and WebSocket surface of the gateway.
//!
//! Both ingress paths feed the same orchestrator. `POST /chat` answers with a
//! single JSON body; the duplex endpoint (`GET /` or `GET /ws`) answers every
//! inbound frame with one `{response}` frame on the same channel.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::GatewayError;
use crate::orchestrator::Orchestrator;
use crate::sessions::{SessionRegistry, SharedContext};

pub mod chat;
pub mod origin;
pub mod peer;
pub mod websocket;

pub use origin::OriginPolicy;
pub use peer::PeerAddr;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionRegistry>,
    pub origins: OriginPolicy,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat::chat))
        .route("/", get(websocket::ws_handler))
        .route("/ws", get(websocket::ws_handler))
}

pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let connections = state.sessions.connected_count().await;
    let unary_contexts = state.sessions.unary_count().await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "connections": connections,
            "unary_contexts": unary_contexts,
        })),
    )
}

/// CORS for the HTTP routes, using the same substring rule as the handshake.
pub fn cors_layer(origins: &OriginPolicy) -> CorsLayer {
    let origins = origins.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origins.accepts(origin.to_str().ok())
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Run one conversational turn on its own task.
///
/// Turns within one context are serialised by its mutex. The spawned task
/// keeps a panic or abort from reaching the connection loop.
pub(crate) async fn run_turn(
    orchestrator: Arc<Orchestrator>,
    context: SharedContext,
    input: String,
) -> Result<String, GatewayError> {
    tokio::spawn(async move {
        let mut context = context.lock_owned().await;
        orchestrator.handle(&mut context, &input).await
    })
    .await
    .map_err(|e| GatewayError::Internal(e.to_string()))
}

/// Wall-clock time attached to lifecycle and payload logs.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
