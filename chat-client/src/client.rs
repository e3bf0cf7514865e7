//! Reconnecting chat client.
//!
//! A single supervisor task owns the connection. It probes the endpoint list
//! in order with a per-endpoint timeout, backs off between failed cycles, and
//! gives up after `max_attempts` consecutive failures. Only the supervisor
//! starts cycles, so two attempts can never overlap. The pending connect is
//! polled alongside user commands, so a send during a cycle is answered
//! immediately.
//!
//! Everything the user should see is published as [`ClientEvent`]s; the
//! current [`ConnectionAttemptState`] is also available through a watch
//! channel.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ReconnectPolicy};
use crate::connector::{Channel, Connector, InboundFrame};
use crate::error::ClientError;
use crate::frame::{parse_inbound, InboundMessage};

pub const NOT_CONNECTED_MESSAGE: &str =
    "Sorry, I'm not connected right now. Please wait while I reconnect...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// A failed cycle is waiting out its backoff delay
    Reconnecting,
    /// Attempt cap reached; only a manual request starts another cycle
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionAttemptState {
    pub endpoint_index: usize,
    /// Consecutive failed cycles; reset on a successful open
    pub attempt_count: u32,
    pub status: ConnectionStatus,
}

impl Default for ConnectionAttemptState {
    fn default() -> Self {
        Self {
            endpoint_index: 0,
            attempt_count: 0,
            status: ConnectionStatus::Disconnected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Status(ConnectionAttemptState),
    Message { speaker: Speaker, text: String },
    EndpointFailed { endpoint: String, reason: String },
    ReconnectScheduled { delay: Duration, attempt_count: u32 },
}

enum Command {
    Send(String),
    Reconnect,
    Shutdown,
}

enum Wake {
    Frame(Option<InboundFrame>),
    Command(Option<Command>),
    Attempt(Result<Channel, ClientError>),
    CycleDue,
}

/// One endpoint's connect, already bounded by the connect timeout.
type PendingAttempt = Pin<Box<dyn Future<Output = Result<Channel, ClientError>> + Send>>;

pub struct ChatClient {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionAttemptState>,
    supervisor: JoinHandle<()>,
}

impl ChatClient {
    /// Start the supervisor; the first connection cycle begins immediately.
    pub fn spawn(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionAttemptState::default());

        let supervisor = Supervisor {
            connector,
            endpoints: config.endpoints,
            policy: config.policy,
            state: ConnectionAttemptState::default(),
            status: status_tx,
            events: events_tx,
            commands: commands_rx,
            channel: None,
            attempt: None,
            next_cycle: Some(Instant::now()),
        };

        let client = Self {
            commands: commands_tx,
            status: status_rx,
            supervisor: tokio::spawn(supervisor.run()),
        };
        (client, events_rx)
    }

    /// Show `text` as a user message and deliver it if connected. When not
    /// connected, a local notice is shown and a fresh cycle is requested.
    pub fn send(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.commands
            .send(Command::Send(text.into()))
            .map_err(|_| ClientError::Stopped)
    }

    /// Request one connection cycle now, even after the attempt cap.
    pub fn reconnect(&self) -> Result<(), ClientError> {
        self.commands
            .send(Command::Reconnect)
            .map_err(|_| ClientError::Stopped)
    }

    pub fn state(&self) -> ConnectionAttemptState {
        *self.status.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionAttemptState> {
        self.status.clone()
    }

    /// Close the live channel and stop the supervisor.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.supervisor.await {
            warn!(error = %e, "client supervisor ended abnormally");
        }
    }
}

struct Supervisor {
    connector: Arc<dyn Connector>,
    endpoints: Vec<String>,
    policy: ReconnectPolicy,
    state: ConnectionAttemptState,
    status: watch::Sender<ConnectionAttemptState>,
    events: mpsc::UnboundedSender<ClientEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    channel: Option<Channel>,
    /// Connect in flight for `state.endpoint_index`; `Some` only mid-cycle
    attempt: Option<PendingAttempt>,
    /// When the next cycle starts; `None` when none is pending
    next_cycle: Option<Instant>,
}

impl Supervisor {
    async fn run(mut self) {
        loop {
            let wake = if let Some(channel) = self.channel.as_mut() {
                tokio::select! {
                    frame = channel.inbound.recv() => Wake::Frame(frame),
                    command = self.commands.recv() => Wake::Command(command),
                }
            } else if let Some(attempt) = self.attempt.as_mut() {
                tokio::select! {
                    outcome = attempt => Wake::Attempt(outcome),
                    command = self.commands.recv() => Wake::Command(command),
                }
            } else {
                let deadline = self.next_cycle;
                let due = sleep_until(deadline.unwrap_or_else(Instant::now));
                tokio::select! {
                    _ = due, if deadline.is_some() => Wake::CycleDue,
                    command = self.commands.recv() => Wake::Command(command),
                }
            };

            match wake {
                Wake::Frame(frame) => self.on_frame(frame),
                Wake::Attempt(outcome) => {
                    self.attempt = None;
                    self.on_attempt(outcome);
                }
                Wake::CycleDue => {
                    self.next_cycle = None;
                    self.begin_cycle();
                }
                Wake::Command(command) => {
                    if !self.on_command(command) {
                        break;
                    }
                }
            }
        }

        self.attempt = None;
        self.channel = None;
        self.next_cycle = None;
        self.state.status = ConnectionStatus::Disconnected;
        self.publish();
        info!("chat client stopped");
    }

    fn on_command(&mut self, command: Option<Command>) -> bool {
        match command {
            Some(Command::Send(text)) => {
                self.send(text);
                true
            }
            Some(Command::Reconnect) => {
                self.request_cycle();
                true
            }
            Some(Command::Shutdown) | None => false,
        }
    }

    fn on_frame(&mut self, frame: Option<InboundFrame>) {
        match frame {
            Some(InboundFrame::Text(raw)) => {
                let message = parse_inbound(&raw);
                if let InboundMessage::PlainText(_) = message {
                    debug!("inbound frame is not a structured reply; showing it verbatim");
                }
                self.emit(ClientEvent::Message {
                    speaker: Speaker::Assistant,
                    text: message.into_text(),
                });
            }
            Some(InboundFrame::Error(reason)) => {
                warn!(%reason, "channel error");
                self.on_closed();
            }
            Some(InboundFrame::Closed) | None => self.on_closed(),
        }
    }

    fn send(&mut self, text: String) {
        self.emit(ClientEvent::Message {
            speaker: Speaker::User,
            text: text.clone(),
        });

        let delivered = match &self.channel {
            Some(channel) if self.state.status == ConnectionStatus::Connected => {
                channel.outbound.send(text).is_ok()
            }
            _ => false,
        };
        if delivered {
            return;
        }

        if self.channel.is_some() {
            // Writer is gone: the channel is dead even if no close was seen yet.
            self.channel = None;
            self.state.status = ConnectionStatus::Disconnected;
            self.publish();
        }
        self.emit(ClientEvent::Message {
            speaker: Speaker::Assistant,
            text: NOT_CONNECTED_MESSAGE.to_string(),
        });
        self.request_cycle();
    }

    /// Start a cycle now unless one is already running or a channel is open.
    fn request_cycle(&mut self) {
        if self.channel.is_none() && self.attempt.is_none() {
            self.next_cycle = Some(Instant::now());
        }
    }

    /// Probe every endpoint once, in order, with no delay between them.
    fn begin_cycle(&mut self) {
        self.state.status = ConnectionStatus::Connecting;
        self.state.endpoint_index = 0;
        self.publish();

        if self.endpoints.is_empty() {
            warn!("no endpoints configured");
            self.finish_failed_cycle();
            return;
        }
        self.start_attempt(0);
    }

    fn start_attempt(&mut self, index: usize) {
        if index != self.state.endpoint_index {
            self.state.endpoint_index = index;
            self.publish();
        }

        let endpoint = self.endpoints[index].clone();
        let connector = self.connector.clone();
        let connect_timeout = self.policy.connect_timeout;
        info!(%endpoint, "connecting");

        self.attempt = Some(Box::pin(async move {
            let outcome = timeout(connect_timeout, connector.connect(&endpoint)).await;
            match outcome {
                Ok(result) => result,
                Err(_) => Err(ClientError::Timeout {
                    endpoint,
                    timeout: connect_timeout,
                }),
            }
        }));
    }

    fn on_attempt(&mut self, outcome: Result<Channel, ClientError>) {
        let index = self.state.endpoint_index;
        let endpoint = self.endpoints[index].clone();

        match outcome {
            Ok(channel) => {
                self.channel = Some(channel);
                self.next_cycle = None;
                self.state.attempt_count = 0;
                self.state.status = ConnectionStatus::Connected;
                self.publish();
                info!(%endpoint, "connected");
            }
            Err(e) => {
                warn!(%endpoint, error = %e, "endpoint failed");
                self.emit(ClientEvent::EndpointFailed {
                    endpoint,
                    reason: e.to_string(),
                });
                if index + 1 < self.endpoints.len() {
                    self.start_attempt(index + 1);
                } else {
                    self.finish_failed_cycle();
                }
            }
        }
    }

    fn finish_failed_cycle(&mut self) {
        self.state.endpoint_index = 0;
        self.state.attempt_count = self.state.attempt_count.saturating_add(1);
        if self.state.attempt_count < self.policy.max_attempts {
            self.state.status = ConnectionStatus::Reconnecting;
            self.publish();
            self.schedule(self.policy.backoff_delay(self.state.attempt_count - 1));
        } else {
            self.state.status = ConnectionStatus::Failed;
            self.next_cycle = None;
            self.publish();
            warn!(
                attempts = self.state.attempt_count,
                "all endpoints failed; giving up until a manual reconnect"
            );
        }
    }

    fn on_closed(&mut self) {
        self.channel = None;
        self.state.status = ConnectionStatus::Disconnected;
        self.publish();
        info!("connection closed");

        if self.state.attempt_count < self.policy.max_attempts {
            self.schedule(self.policy.backoff_delay(self.state.attempt_count));
        }
    }

    fn schedule(&mut self, delay: Duration) {
        self.next_cycle = Some(Instant::now() + delay);
        info!(
            delay_ms = delay.as_millis() as u64,
            attempt_count = self.state.attempt_count,
            "reconnect scheduled"
        );
        self.emit(ClientEvent::ReconnectScheduled {
            delay,
            attempt_count: self.state.attempt_count,
        });
    }

    fn publish(&self) {
        self.status.send_replace(self.state);
        self.emit(ClientEvent::Status(self.state));
    }

    fn emit(&self, event: ClientEvent) {
        // Nobody listening is fine; the watch channel still tracks state.
        let _ = self.events.send(event);
    }
}
