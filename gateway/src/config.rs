use std::time::Duration;

pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
];

pub const DEFAULT_SEARCH_TRIGGERS: &[&str] = &[
    "/search",
    "/web",
    "!search",
    "find information about",
    "search the web for",
    "lookup",
    "what can you find about",
];

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Eliza, a friendly and intelligent AI assistant. \
You can engage in conversation, answer questions, and help with various tasks. \
Be warm, helpful, and show personality while remaining professional.";

#[derive(Debug, Clone)]
pub struct Config {
    /// Interface the gateway binds to
    pub host: String,
    /// Port shared by `POST /chat` and the duplex endpoint
    pub port: u16,
    /// Origins accepted by the duplex handshake and CORS (substring match)
    pub allowed_origins: Vec<String>,
    /// Completion provider key; `None` until the credential bootstrap runs.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub completion_model: String,
    pub completion_max_tokens: u32,
    /// Search provider key. Searches fail (and fall through) without it.
    pub tavily_api_key: Option<String>,
    pub search_url: String,
    pub search_max_results: u32,
    /// Ordered trigger phrases; earlier entries win ties.
    pub search_triggers: Vec<String>,
    /// Number of snippets quoted when search stands in for the completion provider
    pub fallback_snippets: usize,
    pub system_prompt: String,
    /// Idle time after which a `POST /chat` conversation is forgotten
    pub unary_context_ttl: Duration,
    pub provider_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env_str("GATEWAY_HOST", "0.0.0.0"),
            port: env_parse("GATEWAY_PORT", 3000)?,
            allowed_origins: env_csv("GATEWAY_ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_base_url: env_str("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            completion_model: env_str("GATEWAY_COMPLETION_MODEL", "gpt-3.5-turbo"),
            completion_max_tokens: env_parse("GATEWAY_COMPLETION_MAX_TOKENS", 150)?,
            tavily_api_key: env_opt("TAVILY_API_KEY"),
            search_url: env_str("GATEWAY_SEARCH_URL", "https://api.tavily.com/search"),
            search_max_results: env_parse("GATEWAY_SEARCH_MAX_RESULTS", 5)?,
            search_triggers: env_csv("GATEWAY_SEARCH_TRIGGERS", DEFAULT_SEARCH_TRIGGERS),
            fallback_snippets: env_parse("GATEWAY_FALLBACK_SNIPPETS", 5)?,
            system_prompt: env_str("GATEWAY_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            unary_context_ttl: Duration::from_secs(env_parse(
                "GATEWAY_UNARY_CONTEXT_TTL_SECS",
                1800,
            )?),
            provider_timeout: Duration::from_secs(env_parse("GATEWAY_PROVIDER_TIMEOUT_SECS", 60)?),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            completion_model: "gpt-3.5-turbo".to_string(),
            completion_max_tokens: 150,
            tavily_api_key: None,
            search_url: "https://api.tavily.com/search".to_string(),
            search_max_results: 5,
            search_triggers: DEFAULT_SEARCH_TRIGGERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            fallback_snippets: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            unary_context_ttl: Duration::from_secs(1800),
            provider_timeout: Duration::from_secs(60),
        }
    }
}

/// Load `.env` from the current directory or the nearest ancestor that has one,
/// so running from `gateway/` still picks up the workspace-root file.
pub fn load_env_file() {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine current directory for .env lookup");
            return;
        }
    };

    let mut current = cwd.clone();
    loop {
        let candidate = current.join(".env");
        if candidate.exists() {
            match dotenvy::from_path(&candidate) {
                Ok(_) => tracing::info!(path = %candidate.display(), "Loaded environment from .env"),
                Err(e) => tracing::warn!(
                    path = %candidate.display(),
                    error = %e,
                    "Failed to load .env file"
                ),
            }
            return;
        }

        if !current.pop() {
            break;
        }
    }

    tracing::info!(
        cwd = %cwd.display(),
        "No .env file found; using process environment only"
    );
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
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
