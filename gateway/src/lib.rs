pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod sessions;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::{ApiState, OriginPolicy};
use crate::config::Config;
use crate::error::StartupError;
use crate::orchestrator::Orchestrator;
use crate::providers::{CompletionProvider, SearchProvider};
use crate::sessions::SessionRegistry;

/// Assemble shared request state from configuration and provider adapters.
pub fn build_state(
    config: &Config,
    completion: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchProvider>,
) -> Result<ApiState, StartupError> {
    let orchestrator = Orchestrator::from_config(config, completion, search)
        .map_err(|e| StartupError::Config(e.to_string()))?;

    Ok(ApiState {
        orchestrator: Arc::new(orchestrator),
        sessions: SessionRegistry::new(config.unary_context_ttl),
        origins: OriginPolicy::new(config.allowed_origins.iter().cloned()),
    })
}

/// Full application: routes, CORS and request tracing.
pub fn build_router(state: ApiState) -> Router {
    let cors = api::cors_layer(&state.origins);
    api::router()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
