pub mod analyzer;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod extract;
pub mod materializer;
pub mod orchestrator;
pub mod paths;
pub mod prompts;
pub mod providers;
pub mod server;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

pub async fn run() -> Result<()> {
    let config = config::AppConfig::from_env();

    // A missing credential is a first-use error, not a startup crash;
    // report it early so misconfiguration is visible in the logs.
    match config.provider_config(&config.default_provider) {
        Ok(provider_config) => info!(
            provider = %config.default_provider,
            model = %provider_config.model,
            configured = provider_config.api_key.is_some() || provider_config.base_url.is_some(),
            "active provider"
        ),
        Err(e) => warn!(error = %e, "default provider is not usable"),
    }

    let state = Arc::new(server::AppState::new(config));
    server::serve(state).await
}
