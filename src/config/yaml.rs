//! YAML configuration file loading.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{ServerConfig, TlsConfig};

/// Complete YAML configuration structure.
///
/// All fields are optional to allow partial configuration; anything left
/// out keeps the value from the environment layer.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   static_dir: "static"
///   tls:
///     cert_path: "/etc/relay/cert.pem"
///     key_path: "/etc/relay/key.pem"
///
/// relay:
///   gemini_api_key: "your-gemini-key"
///   upstream_ws_url: "wss://generativelanguage.googleapis.com"
///   gateway_base_url: "https://generativelanguage.googleapis.com/v1beta/openai"
///   connect_timeout_secs: 10
///   max_pending_frames: 512
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub(super) struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub relay: Option<RelayYaml>,
    pub security: Option<SecurityYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub(super) struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub static_dir: Option<String>,
    pub tls: Option<TlsYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub(super) struct TlsYaml {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub(super) struct RelayYaml {
    pub gemini_api_key: Option<String>,
    pub upstream_ws_url: Option<String>,
    pub gateway_base_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub max_pending_frames: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub(super) struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| format!("Failed to read config file {}: {err}", path.display()))?;
        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|err| format!("Invalid YAML in {}: {err}", path.display()))?;
        Ok(config)
    }

    /// Apply YAML overrides on top of an environment-derived base.
    pub fn merge_over(
        self,
        mut config: ServerConfig,
    ) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(dir) = server.static_dir {
                config.static_dir = PathBuf::from(dir);
            }
            if let Some(tls) = server.tls {
                config.tls = match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    }),
                    (None, None) => config.tls,
                    _ => {
                        return Err(
                            "tls.cert_path and tls.key_path must be set together".into()
                        );
                    }
                };
            }
        }

        if let Some(relay) = self.relay {
            if let Some(key) = relay.gemini_api_key {
                config.gemini_api_key = Some(key);
            }
            if let Some(upstream) = relay.upstream_ws_url {
                config.upstream_ws_url = Url::parse(&upstream)
                    .map_err(|err| format!("Invalid relay.upstream_ws_url: {err}"))?;
            }
            if let Some(gateway) = relay.gateway_base_url {
                config.gateway_base_url = Url::parse(&gateway)
                    .map_err(|err| format!("Invalid relay.gateway_base_url: {err}"))?;
            }
            if let Some(secs) = relay.connect_timeout_secs {
                config.upstream_connect_timeout = Duration::from_secs(secs);
            }
            if let Some(frames) = relay.max_pending_frames {
                config.max_pending_frames = frames;
            }
        }

        if let Some(security) = self.security {
            if let Some(origins) = security.cors_allowed_origins {
                config.cors_allowed_origins = Some(origins);
            }
            if let Some(rps) = security.rate_limit_requests_per_second {
                config.rate_limit_requests_per_second = rps;
            }
            if let Some(burst) = security.rate_limit_burst_size {
                config.rate_limit_burst_size = burst;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml: YamlConfig = serde_yaml::from_str(
            r#"
server:
  port: 9443
relay:
  gemini_api_key: "yaml-key"
  max_pending_frames: 64
"#,
        )
        .unwrap();

        let base = ServerConfig::default();
        let merged = yaml.merge_over(base).unwrap();
        assert_eq!(merged.port, 9443);
        assert_eq!(merged.host, "0.0.0.0");
        assert_eq!(merged.gemini_api_key.as_deref(), Some("yaml-key"));
        assert_eq!(merged.max_pending_frames, 64);
        assert_eq!(
            merged.upstream_ws_url.as_str(),
            "wss://generativelanguage.googleapis.com/"
        );
    }

    #[test]
    fn rejects_half_configured_tls() {
        let yaml: YamlConfig = serde_yaml::from_str(
            r#"
server:
  tls:
    cert_path: "/tmp/cert.pem"
"#,
        )
        .unwrap();
        assert!(yaml.merge_over(ServerConfig::default()).is_err());
    }

    #[test]
    fn rejects_invalid_upstream_url() {
        let yaml: YamlConfig = serde_yaml::from_str(
            r#"
relay:
  upstream_ws_url: "not a url"
"#,
        )
        .unwrap();
        assert!(yaml.merge_over(ServerConfig::default()).is_err());
    }
}
