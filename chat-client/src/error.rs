use std::time::Duration;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("connection to {0} failed: {1}")]
    Connect(String, String),
    #[error("connection to {endpoint} timed out after {}ms", .timeout.as_millis())]
    Timeout { endpoint: String, timeout: Duration },
    #[error("client has shut down")]
    Stopped,
}
