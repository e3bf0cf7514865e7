//! Reconnecting duplex chat client.

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod frame;

pub use client::{
    ChatClient, ClientEvent, ConnectionAttemptState, ConnectionStatus, Speaker,
    NOT_CONNECTED_MESSAGE,
};
pub use config::{ClientConfig, ReconnectPolicy};
pub use connector::{Channel, Connector, InboundFrame, WebSocketConnector};
pub use error::ClientError;
pub use frame::{parse_inbound, InboundMessage};
