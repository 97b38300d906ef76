//! Configuration for the relay gateway.
//!
//! Configuration comes from `.env` files, environment variables, and an
//! optional YAML file. Priority: YAML > environment variables (actual ENV
//! vars override `.env` values) > defaults. The `.env` file is loaded in
//! `main` at startup. The resulting [`ServerConfig`] is immutable for the
//! life of the process.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::core::relay::RelayLimits;

mod env;
mod yaml;

/// Fixed upstream WebSocket endpoint for the Gemini Live API.
pub const DEFAULT_UPSTREAM_WS_URL: &str = "wss://generativelanguage.googleapis.com";

/// OpenAI-compatible REST endpoint used by the default completions gateway.
pub const DEFAULT_GATEWAY_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_STATIC_DIR: &str = "static";

/// TLS configuration for HTTPS and WSS termination.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration.
///
/// Read-only after initialization. The default Gemini API key is the only
/// secret it holds; it is zeroized on drop and excluded from `Debug`
/// output.
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Default upstream API key, used when a client does not supply one via
    /// the `key` query parameter. Empty counts as unset.
    pub gemini_api_key: Option<String>,

    /// Document root for the browser client
    pub static_dir: PathBuf,

    /// Upstream WebSocket endpoint (fixed in production; overridable for
    /// tests and self-hosted deployments)
    pub upstream_ws_url: Url,

    /// Base URL of the OpenAI-compatible completions endpoint
    pub gateway_base_url: Url,

    /// Bound on the upstream WebSocket handshake
    pub upstream_connect_timeout: Duration,

    /// Cap on frames queued per session while upstream is connecting
    pub max_pending_frames: usize,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,

    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tls: None,
            gemini_api_key: None,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            upstream_ws_url: Url::parse(DEFAULT_UPSTREAM_WS_URL)
                .expect("default upstream URL is valid"),
            gateway_base_url: Url::parse(DEFAULT_GATEWAY_BASE_URL)
                .expect("default gateway URL is valid"),
            upstream_connect_timeout: Duration::from_secs(10),
            max_pending_frames: 512,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
        }
    }
}

/// The API key must never land in logs; everything else is fair game.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_deref().map(|_| "***"),
            )
            .field("static_dir", &self.static_dir)
            .field("upstream_ws_url", &self.upstream_ws_url.as_str())
            .field("gateway_base_url", &self.gateway_base_url.as_str())
            .field("upstream_connect_timeout", &self.upstream_connect_timeout)
            .field("max_pending_frames", &self.max_pending_frames)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field(
                "rate_limit_requests_per_second",
                &self.rate_limit_requests_per_second,
            )
            .field("rate_limit_burst_size", &self.rate_limit_burst_size)
            .finish()
    }
}

/// Zeroize the default API key when the config is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (with defaults).
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::from_env()?;
        validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file layered over the environment.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override `.env` values)
    /// 3. Default values
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml = yaml::YamlConfig::from_file(path)?;
        let config = yaml.merge_over(env::from_env()?)?;
        validate(&config)?;
        Ok(config)
    }

    /// The server address as `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether TLS termination is enabled.
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Whether a non-empty default API key is configured.
    pub fn has_default_api_key(&self) -> bool {
        self.default_api_key().is_some()
    }

    /// The default API key, treating an empty string as unset.
    pub fn default_api_key(&self) -> Option<&str> {
        self.gemini_api_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Per-session relay bounds derived from this configuration.
    pub fn relay_limits(&self) -> RelayLimits {
        RelayLimits {
            connect_timeout: self.upstream_connect_timeout,
            max_pending_frames: self.max_pending_frames,
        }
    }
}

fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    match config.upstream_ws_url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(format!("UPSTREAM_WS_URL must use ws or wss, got: {other}").into());
        }
    }
    match config.gateway_base_url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(format!("GATEWAY_BASE_URL must use http or https, got: {other}").into());
        }
    }
    if config.max_pending_frames == 0 {
        return Err("MAX_PENDING_FRAMES must be at least 1".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_formats_host_and_port() {
        let mut config = ServerConfig::default();
        config.host = "localhost".to_string();
        config.port = 3001;
        assert_eq!(config.address(), "localhost:3001");
    }

    #[test]
    fn default_key_treats_empty_as_unset() {
        let mut config = ServerConfig::default();
        assert!(!config.has_default_api_key());

        config.gemini_api_key = Some(String::new());
        assert!(!config.has_default_api_key());

        config.gemini_api_key = Some("k".to_string());
        assert_eq!(config.default_api_key(), Some("k"));
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let mut config = ServerConfig::default();
        config.gemini_api_key = Some("very-secret".to_string());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn validate_rejects_bad_schemes() {
        let mut config = ServerConfig::default();
        config.upstream_ws_url = Url::parse("https://example.com").unwrap();
        assert!(validate(&config).is_err());

        let mut config = ServerConfig::default();
        config.gateway_base_url = Url::parse("ftp://example.com").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn validate_rejects_zero_queue_cap() {
        let mut config = ServerConfig::default();
        config.max_pending_frames = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn relay_limits_mirror_config() {
        let mut config = ServerConfig::default();
        config.upstream_connect_timeout = Duration::from_secs(3);
        config.max_pending_frames = 7;
        let limits = config.relay_limits();
        assert_eq!(limits.connect_timeout, Duration::from_secs(3));
        assert_eq!(limits.max_pending_frames, 7);
    }
}
