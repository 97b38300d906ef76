pub mod config;
pub mod core;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use core::relay::{ApiKey, RelayError, RelayLimits};
pub use handlers::gateway::{CompletionsGateway, GatewayError, HttpCompletionsGateway};
pub use state::AppState;
