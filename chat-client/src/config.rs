use std::time::Duration;

pub const DEFAULT_ENDPOINTS: &[&str] = &["ws://127.0.0.1:3000", "ws://localhost:3000"];
pub const DEFAULT_ORIGIN: &str = "http://localhost:5173";

/// Timing and retry limits for the connection supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Per-endpoint limit on reaching the open state
    pub connect_timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed cycles after which the client stops retrying
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before retrying after the `n`-th consecutive failure (from 0):
    /// `min(base_delay * (n + 1), max_delay)`.
    pub fn backoff_delay(&self, n: u32) -> Duration {
        self.base_delay
            .saturating_mul(n.saturating_add(1))
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(5000),
            base_delay: Duration::from_millis(5000),
            max_delay: Duration::from_millis(30000),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Candidate duplex endpoints, probed in order
    pub endpoints: Vec<String>,
    /// `Origin` header sent with every handshake
    pub origin: String,
    pub policy: ReconnectPolicy,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = ReconnectPolicy::default();
        let millis = |key: &str, default: Duration| {
            env_parse(key, default.as_millis() as u64).map(Duration::from_millis)
        };
        Ok(Self {
            endpoints: env_csv("CHAT_CLIENT_ENDPOINTS", DEFAULT_ENDPOINTS),
            origin: env_parse("CHAT_CLIENT_ORIGIN", DEFAULT_ORIGIN.to_string())?,
            policy: ReconnectPolicy {
                connect_timeout: millis(
                    "CHAT_CLIENT_CONNECT_TIMEOUT_MS",
                    defaults.connect_timeout,
                )?,
                base_delay: millis("CHAT_CLIENT_BASE_DELAY_MS", defaults.base_delay)?,
                max_delay: millis("CHAT_CLIENT_MAX_DELAY_MS", defaults.max_delay)?,
                max_attempts: env_parse("CHAT_CLIENT_MAX_ATTEMPTS", defaults.max_attempts)?,
            },
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| (*s).to_string()).collect(),
            origin: DEFAULT_ORIGIN.to_string(),
            policy: ReconnectPolicy::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Err(_) => default.iter().map(|s| (*s).to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_linearly_then_caps() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..7)
            .map(|n| policy.backoff_delay(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![5000, 10000, 15000, 20000, 25000, 30000, 30000]);
        assert_eq!(policy.backoff_delay(u32::MAX), Duration::from_millis(30000));
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoints, vec!["ws://127.0.0.1:3000", "ws://localhost:3000"]);
        assert_eq!(config.origin, "http://localhost:5173");
        assert_eq!(config.policy.connect_timeout, Duration::from_millis(5000));
        assert_eq!(config.policy.max_attempts, 5);
    }

    #[test]
    fn test_from_env_reads_millisecond_overrides() {
        std::env::set_var("CHAT_CLIENT_CONNECT_TIMEOUT_MS", "250");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.policy.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.policy.base_delay, Duration::from_millis(5000));

        std::env::set_var("CHAT_CLIENT_CONNECT_TIMEOUT_MS", "soon");
        assert!(ClientConfig::from_env().is_err());
        std::env::remove_var("CHAT_CLIENT_CONNECT_TIMEOUT_MS");
    }
}
