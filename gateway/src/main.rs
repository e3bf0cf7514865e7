use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gateway::config::{load_env_file, Config};
use gateway::credentials::bootstrap_completion_key;
use gateway::error::StartupError;
use gateway::providers::{http_client, OpenAiCompletion, TavilySearch};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const UNARY_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Search the current directory and ancestors so running from `gateway/`
    // still picks up the workspace-root `.env`.
    load_env_file();

    let mut config = Config::from_env()?;
    let completion_key = bootstrap_completion_key(config.openai_api_key.take()).await?;
    if config.tavily_api_key.is_none() {
        warn!("TAVILY_API_KEY not set; web search will report no results");
    }

    let http = http_client(config.provider_timeout)?;
    let completion = Arc::new(OpenAiCompletion::new(
        http.clone(),
        config.openai_base_url.clone(),
        completion_key,
        config.completion_model.clone(),
        config.completion_max_tokens,
    ));
    let search = Arc::new(TavilySearch::new(
        http,
        config.search_url.clone(),
        config.tavily_api_key.clone(),
        config.search_max_results,
    ));

    let state = gateway::build_state(&config, completion, search)?;
    tokio::spawn(state.sessions.clone().run_unary_pruner(UNARY_PRUNE_INTERVAL));
    let triggers: Vec<&str> = state
        .orchestrator
        .triggers()
        .matchers()
        .iter()
        .map(|m| m.describe())
        .collect();
    info!(
        origins = ?state.origins.allowed(),
        triggers = ?triggers,
        model = %config.completion_model,
        "gateway ready"
    );

    let app = gateway::build_router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    info!(%address, "gateway listening (POST /chat, duplex on / and /ws)");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
