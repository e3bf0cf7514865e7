//! Duplex chat endpoint.
//!
//! Each inbound text (or binary, decoded lossily) frame is one user message.
//! The reply goes back as a single `{"response": ...}` text frame. Failures
//! are answered with the apology as an ordinary payload so the channel stays
//! open.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use shared_types::ChatResponse;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{run_turn, timestamp, ApiState, PeerAddr};
use crate::error::{GatewayError, APOLOGY};
use crate::sessions::{derive_client_id, ClientSession, SessionHandle};

/// Sent in place of an empty orchestrator reply.
pub const EMPTY_REPLY: &str = "I'm unable to generate a response right now.";

pub async fn ws_handler(
    State(state): State<ApiState>,
    PeerAddr(peer): PeerAddr,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let client_id = derive_client_id(peer.ip(), peer.port());
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    if !state.origins.accepts(origin.as_deref()) {
        warn!(
            client_id = %client_id,
            origin = origin.as_deref().unwrap_or("<missing>"),
            timestamp = %timestamp(),
            "duplex handshake rejected: origin not allowed"
        );
        return GatewayError::OriginRejected(origin).into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(client_id = %client_id, error = %rejection, "not a websocket upgrade");
            return rejection.into_response();
        }
    };

    info!(
        client_id = %client_id,
        origin = origin.as_deref().unwrap_or_default(),
        timestamp = %timestamp(),
        "duplex handshake accepted"
    );
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id, origin))
}

async fn handle_socket(
    socket: WebSocket,
    state: ApiState,
    client_id: String,
    origin: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // The registry holds the only sender, so replies go through it.
    let session = state
        .sessions
        .register(ClientSession::new(
            client_id.clone(),
            origin,
            tx,
            state.orchestrator.new_context(),
        ))
        .await;
    info!(client_id = %client_id, timestamp = %timestamp(), "duplex connection opened");

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text.as_str().to_string(),
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            // Pongs are queued by the protocol layer.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(frame)) => {
                info!(
                    client_id = %client_id,
                    timestamp = %timestamp(),
                    code = frame.as_ref().map(|f| f.code),
                    reason = frame.as_ref().map(|f| f.reason.as_str()).unwrap_or_default(),
                    "duplex close frame received"
                );
                break;
            }
            Err(e) => {
                warn!(
                    client_id = %client_id,
                    timestamp = %timestamp(),
                    error = %e,
                    "duplex channel error"
                );
                break;
            }
        };

        info!(
            client_id = %client_id,
            timestamp = %timestamp(),
            message = %text,
            "duplex message received"
        );

        let reply = respond(&state, &session, text).await;
        let payload = match serde_json::to_string(&ChatResponse::new(reply)) {
            Ok(payload) => payload,
            Err(e) => {
                error!(client_id = %client_id, error = %e, "failed to encode duplex reply");
                continue;
            }
        };

        info!(
            client_id = %client_id,
            timestamp = %timestamp(),
            payload = %payload,
            "duplex response sent"
        );
        if !state
            .sessions
            .send_to(&session, Message::Text(payload.into()))
            .await
        {
            warn!(client_id = %client_id, "duplex session gone; dropping reply");
            break;
        }
    }

    state.sessions.remove(&session).await;
    info!(client_id = %client_id, timestamp = %timestamp(), "duplex connection closed");
    writer.abort();
}

async fn respond(state: &ApiState, session: &SessionHandle, text: String) -> String {
    match run_turn(state.orchestrator.clone(), session.context(), text).await {
        Ok(reply) if reply.trim().is_empty() => EMPTY_REPLY.to_string(),
        Ok(reply) => reply,
        Err(e) => {
            error!(
                client_id = %session.client_id,
                timestamp = %timestamp(),
                error = %e,
                "duplex turn failed"
            );
            APOLOGY.to_string()
        }
    }
}
