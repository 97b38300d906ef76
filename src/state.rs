use std::sync::Arc;

use crate::config::ServerConfig;
use crate::handlers::gateway::{CompletionsGateway, HttpCompletionsGateway};

/// Shared application state.
///
/// The configuration is immutable after startup; the completions gateway is
/// an injected collaborator so tests (and alternative deployments) can swap
/// the forwarding implementation without touching the relay core.
pub struct AppState {
    pub config: ServerConfig,
    pub gateway: Arc<dyn CompletionsGateway>,
}

impl AppState {
    /// Build state with the default HTTP completions gateway.
    pub fn new(config: ServerConfig) -> Self {
        let gateway = Arc::new(HttpCompletionsGateway::new(config.gateway_base_url.clone()));
        Self { config, gateway }
    }

    /// Build state with a custom gateway collaborator.
    pub fn with_gateway(config: ServerConfig, gateway: Arc<dyn CompletionsGateway>) -> Self {
        Self { config, gateway }
    }
}
