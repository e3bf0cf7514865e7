//! Line-oriented front end: stdin lines are sent, events are printed.

use std::sync::Arc;

use chat_client::{
    ChatClient, ClientConfig, ClientEvent, ConnectionStatus, Speaker, WebSocketConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "chat_client=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        tracing::info!(path = %path.display(), "Loaded environment from .env");
    }

    let config = ClientConfig::from_env()?;
    tracing::info!(endpoints = ?config.endpoints, origin = %config.origin, "starting chat client");
    let connector = Arc::new(WebSocketConnector::new(config.origin.clone()));
    let (client, mut events) = ChatClient::spawn(config, connector);

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::Message {
                    speaker: Speaker::Assistant,
                    text,
                } => println!("assistant> {text}"),
                ClientEvent::Message {
                    speaker: Speaker::User,
                    ..
                } => {}
                ClientEvent::Status(state) => match state.status {
                    ConnectionStatus::Connected => println!("[connected]"),
                    ConnectionStatus::Failed => {
                        println!("[connection failed; send a message to retry]")
                    }
                    _ => {}
                },
                ClientEvent::ReconnectScheduled { delay, .. } => {
                    println!("[reconnecting in {}s]", delay.as_secs())
                }
                ClientEvent::EndpointFailed { .. } => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if client.send(line).is_err() {
            break;
        }
    }

    client.shutdown().await;
    printer.abort();
    Ok(())
}
