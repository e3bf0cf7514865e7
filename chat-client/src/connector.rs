//! Channel establishment.
//!
//! A [`Connector`] opens one duplex channel to one endpoint and returns it as
//! a pair of queues, so the supervisor never touches the socket itself.
//! Dropping [`Channel::outbound`] closes the connection.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Closed,
    Error(String),
}

/// An open duplex channel.
pub struct Channel {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<InboundFrame>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Resolve once the channel is open. Timeouts are applied by the caller.
    async fn connect(&self, endpoint: &str) -> Result<Channel, ClientError>;
}

/// WebSocket connector that presents a fixed `Origin` header.
pub struct WebSocketConnector {
    origin: String,
}

impl WebSocketConnector {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &str) -> Result<Channel, ClientError> {
        let connect_error = |e: &dyn std::fmt::Display| {
            ClientError::Connect(endpoint.to_string(), e.to_string())
        };

        let mut request = endpoint
            .into_client_request()
            .map_err(|e| connect_error(&e))?;
        let origin = HeaderValue::from_str(&self.origin).map_err(|e| connect_error(&e))?;
        request.headers_mut().insert("Origin", origin);

        let (socket, _) = connect_async(request).await.map_err(|e| connect_error(&e))?;
        let (mut sink, mut stream) = socket.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<InboundFrame>();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if sink.send(Message::Text(text)).await.is_err() {
                    return;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        let endpoint = endpoint.to_string();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let forwarded = match frame {
                    Ok(Message::Text(text)) => InboundFrame::Text(text),
                    Ok(Message::Binary(bytes)) => {
                        InboundFrame::Text(String::from_utf8_lossy(&bytes).into_owned())
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(%endpoint, error = %e, "websocket receive error");
                        let _ = inbound_tx.send(InboundFrame::Error(e.to_string()));
                        return;
                    }
                };
                if inbound_tx.send(forwarded).is_err() {
                    return;
                }
            }
            let _ = inbound_tx.send(InboundFrame::Closed);
        });

        Ok(Channel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
