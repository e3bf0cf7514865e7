//! Per-connection and per-caller conversation state.
//!
//! Duplex sessions are keyed by client id (`"{address}:{port}"`) and live
//! exactly as long as their channel. Unary `POST /chat` callers have no
//! channel, so their contexts are kept in a separate map and forgotten after
//! a period of inactivity.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::orchestrator::ConversationContext;

/// Conversation context shared between a session entry and its handler task.
/// The mutex serialises turns within one conversation.
pub type SharedContext = Arc<Mutex<ConversationContext>>;

pub fn derive_client_id(address: IpAddr, port: u16) -> String {
    format!("{address}:{port}")
}

pub struct ClientSession {
    pub client_id: String,
    pub origin: Option<String>,
    pub connected_at: DateTime<Utc>,
    /// Assigned on registration; distinguishes sockets that share a client id
    token: u64,
    outbound: mpsc::UnboundedSender<Message>,
    context: SharedContext,
}

impl ClientSession {
    pub fn new(
        client_id: impl Into<String>,
        origin: Option<String>,
        outbound: mpsc::UnboundedSender<Message>,
        context: ConversationContext,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            origin,
            connected_at: Utc::now(),
            token: 0,
            outbound,
            context: Arc::new(Mutex::new(context)),
        }
    }
}

/// What a connection task keeps after registering: enough to reach its own
/// entry and nobody else's.
#[derive(Clone)]
pub struct SessionHandle {
    pub client_id: String,
    token: u64,
    context: SharedContext,
}

impl SessionHandle {
    pub fn context(&self) -> SharedContext {
        self.context.clone()
    }
}

struct UnaryEntry {
    context: SharedContext,
    last_used: Instant,
}

pub struct SessionRegistry {
    clients: Mutex<HashMap<String, ClientSession>>,
    unary: Mutex<HashMap<String, UnaryEntry>>,
    unary_ttl: Duration,
    next_token: AtomicU64,
}

impl SessionRegistry {
    pub fn new(unary_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            clients: Mutex::new(HashMap::new()),
            unary: Mutex::new(HashMap::new()),
            unary_ttl,
            next_token: AtomicU64::new(1),
        })
    }

    /// Track a freshly accepted duplex session.
    ///
    /// An existing entry with the same client id is replaced; its writer loses
    /// its sender and the old connection winds down on its own.
    pub async fn register(&self, mut session: ClientSession) -> SessionHandle {
        session.token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let handle = SessionHandle {
            client_id: session.client_id.clone(),
            token: session.token,
            context: session.context.clone(),
        };

        let mut clients = self.clients.lock().await;
        if clients.insert(handle.client_id.clone(), session).is_some() {
            warn!(client_id = %handle.client_id, "replaced stale session with the same client id");
        }
        info!(client_id = %handle.client_id, sessions = clients.len(), "session registered");
        handle
    }

    /// Drop a duplex session if the entry still belongs to `handle`. Its
    /// conversation history goes with it.
    pub async fn remove(&self, handle: &SessionHandle) -> Option<ClientSession> {
        let mut clients = self.clients.lock().await;
        let owned = clients
            .get(&handle.client_id)
            .is_some_and(|session| session.token == handle.token);
        if !owned {
            return None;
        }

        let removed = clients.remove(&handle.client_id);
        if let Some(session) = &removed {
            info!(
                client_id = %handle.client_id,
                origin = session.origin.as_deref().unwrap_or_default(),
                connected_secs = (Utc::now() - session.connected_at).num_seconds(),
                sessions = clients.len(),
                "session removed"
            );
        }
        removed
    }

    /// Queue a frame on the writer of `handle`'s session. Returns `false` when
    /// the entry is gone, was replaced, or its writer has stopped.
    pub async fn send_to(&self, handle: &SessionHandle, message: Message) -> bool {
        match self.clients.lock().await.get(&handle.client_id) {
            Some(session) if session.token == handle.token => {
                session.outbound.send(message).is_ok()
            }
            _ => false,
        }
    }

    pub async fn connected_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Context for a unary caller, created with `make` on first use.
    pub async fn unary_context<F>(&self, key: &str, make: F) -> SharedContext
    where
        F: FnOnce() -> ConversationContext,
    {
        let mut unary = self.unary.lock().await;
        let entry = unary.entry(key.to_string()).or_insert_with(|| UnaryEntry {
            context: Arc::new(Mutex::new(make())),
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();
        entry.context.clone()
    }

    pub async fn unary_count(&self) -> usize {
        self.unary.lock().await.len()
    }

    /// Forget unary contexts idle for at least the configured TTL.
    pub async fn prune_unary(&self) -> usize {
        let mut unary = self.unary.lock().await;
        let before = unary.len();
        unary.retain(|_, entry| entry.last_used.elapsed() < self.unary_ttl);
        before - unary.len()
    }

    /// Background task: periodically prune idle unary contexts.
    pub async fn run_unary_pruner(self: Arc<Self>, interval: Duration) {
        loop {
            sleep(interval).await;
            let pruned = self.prune_unary().await;
            if pruned > 0 {
                info!(pruned, "pruned idle unary conversation contexts");
            }
        }
    }
}
