//! WebSocket Chat Integration Tests
//!
//! Runs a real gateway on an ephemeral port and talks to it with
//! tokio-tungstenite, the same way a browser client would.

mod support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use gateway::orchestrator::{DEFAULT_REPLY, GREETING};
use gateway::providers::{CompletionProvider, SearchProvider};
use gateway::sessions::SessionRegistry;
use support::{sample_results, test_state, ScriptedCompletion, ScriptedSearch};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const ALLOWED_ORIGIN: &str = "http://localhost:5173";

struct TestServer {
    addr: SocketAddr,
    sessions: Arc<SessionRegistry>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_test_server(
    completion: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchProvider>,
) -> TestServer {
    let state = test_state(completion, search);
    let sessions = state.sessions.clone();
    let app = gateway::build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to get addr");

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    TestServer {
        addr,
        sessions,
        handle,
    }
}

fn ws_url(addr: SocketAddr, path: &str) -> String {
    format!("ws://{addr}{path}")
}

async fn connect_with_origin(
    addr: SocketAddr,
    path: &str,
    origin: Option<&'static str>,
) -> Result<Client, WsError> {
    let mut request = ws_url(addr, path)
        .into_client_request()
        .expect("Invalid request");
    if let Some(origin) = origin {
        request
            .headers_mut()
            .insert("Origin", HeaderValue::from_static(origin));
    }
    connect_async(request).await.map(|(ws, _)| ws)
}

async fn connect(addr: SocketAddr) -> Client {
    connect_with_origin(addr, "/ws", Some(ALLOWED_ORIGIN))
        .await
        .expect("Failed to connect WebSocket")
}

async fn recv_json(ws: &mut Client) -> Value {
    let timeout_duration = Duration::from_secs(5);
    loop {
        match timeout(timeout_duration, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return serde_json::from_str(&text).expect("Invalid JSON");
            }
            Ok(Some(Ok(Message::Close(_)))) => panic!("Connection closed"),
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => panic!("Frame error: {e:?}"),
            Ok(None) => panic!("Stream ended"),
            Err(_) => panic!("Timeout waiting for frame"),
        }
    }
}

async fn ask(ws: &mut Client, text: &str) -> String {
    ws.send(Message::Text(text.to_string()))
        .await
        .expect("Failed to send");
    let reply = recv_json(ws).await;
    reply["response"]
        .as_str()
        .expect("reply has a response field")
        .to_string()
}

async fn wait_for_sessions(sessions: &SessionRegistry, expected: usize) {
    for _ in 0..50 {
        if sessions.connected_count().await == expected {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {expected} sessions, found {}",
        sessions.connected_count().await
    );
}

#[tokio::test]
async fn test_ws_greeting_then_completion() {
    let server = start_test_server(ScriptedCompletion::echo(), ScriptedSearch::failing()).await;
    let mut ws = connect(server.addr).await;

    assert_eq!(ask(&mut ws, "hello").await, GREETING);
    assert_eq!(ask(&mut ws, "how are you").await, "echo: how are you");
}

#[tokio::test]
async fn test_ws_root_path_is_duplex_endpoint() {
    let server = start_test_server(ScriptedCompletion::echo(), ScriptedSearch::failing()).await;
    let mut ws = connect_with_origin(server.addr, "/", Some("http://127.0.0.1:3000"))
        .await
        .expect("root path should accept upgrades");
    assert_eq!(ask(&mut ws, "hi").await, GREETING);
}

#[tokio::test]
async fn test_ws_origin_substring_match_accepted() {
    let server = start_test_server(ScriptedCompletion::echo(), ScriptedSearch::failing()).await;
    let result = connect_with_origin(server.addr, "/ws", Some("http://localhost:5173/path")).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_ws_foreign_or_missing_origin_rejected() {
    let server = start_test_server(ScriptedCompletion::echo(), ScriptedSearch::failing()).await;

    for origin in [Some("http://evil.com"), None] {
        match connect_with_origin(server.addr, "/ws", origin).await {
            Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 403),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("handshake with origin {origin:?} should be refused"),
        }
    }
    assert_eq!(server.sessions.connected_count().await, 0);
}

#[tokio::test]
async fn test_ws_sessions_have_independent_histories() {
    let completion = ScriptedCompletion::echo();
    let server = start_test_server(completion.clone(), ScriptedSearch::failing()).await;

    let mut first = connect(server.addr).await;
    let mut second = connect(server.addr).await;
    wait_for_sessions(&server.sessions, 2).await;

    assert_eq!(ask(&mut first, "hello").await, GREETING);
    assert_eq!(ask(&mut first, "from first").await, "echo: from first");
    // The second connection has its own context, so it is greeted too.
    assert_eq!(ask(&mut second, "hello").await, GREETING);
    assert_eq!(ask(&mut second, "from second").await, "echo: from second");

    let calls = completion.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].iter().all(|turn| turn.content != "from first"));
}

#[tokio::test]
async fn test_ws_session_removed_on_close() {
    let server = start_test_server(ScriptedCompletion::echo(), ScriptedSearch::failing()).await;
    let mut ws = connect(server.addr).await;
    wait_for_sessions(&server.sessions, 1).await;

    ws.close(None).await.expect("Failed to close");
    wait_for_sessions(&server.sessions, 0).await;
}

#[tokio::test]
async fn test_ws_binary_frames_treated_as_text() {
    let server = start_test_server(ScriptedCompletion::echo(), ScriptedSearch::failing()).await;
    let mut ws = connect(server.addr).await;
    assert_eq!(ask(&mut ws, "hello").await, GREETING);

    ws.send(Message::Binary(b"bytes in".to_vec()))
        .await
        .expect("Failed to send");
    assert_eq!(recv_json(&mut ws).await["response"], "echo: bytes in");
}

#[tokio::test]
async fn test_ws_ping_gets_exactly_one_pong() {
    let server = start_test_server(ScriptedCompletion::echo(), ScriptedSearch::failing()).await;
    let mut ws = connect(server.addr).await;

    ws.send(Message::Ping(b"heartbeat".to_vec()))
        .await
        .expect("Failed to send ping");
    ws.send(Message::Text("hello".to_string()))
        .await
        .expect("Failed to send");

    let mut pongs = Vec::new();
    let reply: Value = loop {
        match timeout(Duration::from_secs(5), ws.next()).await {
            Ok(Some(Ok(Message::Pong(data)))) => pongs.push(data),
            Ok(Some(Ok(Message::Text(text)))) => {
                break serde_json::from_str(&text).expect("Invalid JSON");
            }
            Ok(Some(Ok(_))) => continue,
            other => panic!("Unexpected frame: {other:?}"),
        }
    };
    assert_eq!(reply["response"], GREETING);
    assert_eq!(pongs, vec![b"heartbeat".to_vec()]);
}

#[tokio::test]
async fn test_ws_provider_failures_reply_normally_and_keep_channel_open() {
    let server = start_test_server(ScriptedCompletion::failing(2), ScriptedSearch::failing()).await;
    let mut ws = connect(server.addr).await;

    assert_eq!(ask(&mut ws, "hello").await, GREETING);
    assert_eq!(ask(&mut ws, "first").await, DEFAULT_REPLY);
    assert_eq!(ask(&mut ws, "second").await, DEFAULT_REPLY);
    assert_eq!(ask(&mut ws, "third").await, "echo: third");
}

#[tokio::test]
async fn test_ws_search_trigger() {
    let search = ScriptedSearch::returning(sample_results(Some("Runtime and framework.")));
    let server = start_test_server(ScriptedCompletion::echo(), search.clone()).await;
    let mut ws = connect(server.addr).await;

    let reply = ask(&mut ws, "/web tokio axum").await;
    assert!(reply.contains("📌 Key Insights:\nRuntime and framework."));
    assert_eq!(search.queries(), vec!["tokio axum".to_string()]);

    // The search did not consume the greeting.
    assert_eq!(ask(&mut ws, "hello").await, GREETING);
}
