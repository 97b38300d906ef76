pub mod relay;

// Re-export commonly used types for convenience
pub use relay::{
    ApiKey, CLOSE_CREDENTIAL_REQUIRED, CLOSE_QUEUE_OVERFLOW, CLOSE_UPSTREAM_FAILURE, RelayError,
    RelayLimits,
};
