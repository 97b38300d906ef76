//! Core relay machinery: credential resolution, upstream address
//! construction, and the per-connection session state machine.
//!
//! The relay treats every WebSocket frame as opaque. Nothing in this module
//! parses, validates, or rewrites payload bytes; the only transformation
//! applied anywhere is the `key` query parameter swap performed by
//! [`target::build_target_url`].

pub mod credentials;
pub mod session;
pub mod target;

use std::time::Duration;

use thiserror::Error;

pub use credentials::{ApiKey, resolve};
pub use session::{
    CLOSE_CREDENTIAL_REQUIRED, CLOSE_QUEUE_OVERFLOW, CLOSE_UPSTREAM_FAILURE, RelayLimits,
};

/// Errors that can occur while establishing or driving a relay session.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No credential could be resolved for the upgrade request
    #[error("API key required")]
    MissingCredential,

    /// The upstream WebSocket handshake failed
    #[error("upstream connection failed: {0}")]
    UpstreamConnect(String),

    /// The upstream handshake did not complete within the configured bound
    #[error("upstream connect timed out after {0:?}")]
    UpstreamConnectTimeout(Duration),

    /// The pending-frame queue hit its configured cap before the upstream
    /// connection opened
    #[error("pending frame queue overflow")]
    QueueOverflow,
}
