//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::{ServerConfig, TlsConfig};

pub(super) fn from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    if let Ok(host) = env::var("HOST") {
        config.host = host;
    }
    if let Ok(port) = env::var("PORT") {
        config.port = port
            .parse()
            .map_err(|_| format!("Invalid PORT value: {port}"))?;
    }
    if let Ok(key) = env::var("GEMINI_API_KEY") {
        config.gemini_api_key = Some(key);
    }
    if let Ok(dir) = env::var("STATIC_DIR") {
        config.static_dir = PathBuf::from(dir);
    }
    if let Ok(upstream) = env::var("UPSTREAM_WS_URL") {
        config.upstream_ws_url =
            Url::parse(&upstream).map_err(|err| format!("Invalid UPSTREAM_WS_URL: {err}"))?;
    }
    if let Ok(gateway) = env::var("GATEWAY_BASE_URL") {
        config.gateway_base_url =
            Url::parse(&gateway).map_err(|err| format!("Invalid GATEWAY_BASE_URL: {err}"))?;
    }
    if let Ok(secs) = env::var("UPSTREAM_CONNECT_TIMEOUT_SECS") {
        let secs: u64 = secs
            .parse()
            .map_err(|_| format!("Invalid UPSTREAM_CONNECT_TIMEOUT_SECS value: {secs}"))?;
        config.upstream_connect_timeout = Duration::from_secs(secs);
    }
    if let Ok(frames) = env::var("MAX_PENDING_FRAMES") {
        config.max_pending_frames = frames
            .parse()
            .map_err(|_| format!("Invalid MAX_PENDING_FRAMES value: {frames}"))?;
    }
    if let Ok(origins) = env::var("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = Some(origins);
    }
    if let Ok(rps) = env::var("RATE_LIMIT_RPS") {
        config.rate_limit_requests_per_second = rps
            .parse()
            .map_err(|_| format!("Invalid RATE_LIMIT_RPS value: {rps}"))?;
    }
    if let Ok(burst) = env::var("RATE_LIMIT_BURST") {
        config.rate_limit_burst_size = burst
            .parse()
            .map_err(|_| format!("Invalid RATE_LIMIT_BURST value: {burst}"))?;
    }

    let cert_path = env::var("TLS_CERT_PATH").ok();
    let key_path = env::var("TLS_KEY_PATH").ok();
    config.tls = match (cert_path, key_path) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into());
        }
    };

    Ok(config)
}
