//! Merging YAML overrides onto the environment configuration.

use std::path::PathBuf;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig, TlsConfig};

/// Environment configuration with any YAML values applied on top.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else {
                match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    (None, None) => {}
                    _ => {
                        return Err(ConfigError::InvalidValue(
                            "server.tls.cert_path and server.tls.key_path must be set together"
                                .to_string(),
                        ));
                    }
                }
            }
        }
    }

    if let Some(gemini) = yaml.gemini {
        if let Some(key) = gemini.api_key.filter(|k| !k.trim().is_empty()) {
            config.google_api_key = Some(key);
        }
        if let Some(model) = gemini.live_model {
            config.live_model = model;
        }
        if let Some(url) = gemini.live_url {
            config.live_ws_url = url;
        }
        if let Some(model) = gemini.transcription_model {
            config.transcription_model = model;
        }
        if let Some(url) = gemini.api_base_url {
            config.gemini_api_base_url = url;
        }
    }

    if let Some(tools) = yaml.tools {
        if let Some(url) = tools.exchange_rate_url {
            config.exchange_rate_url = url;
        }
        if let Some(timeout) = tools.timeout_seconds {
            config.tool_timeout_seconds = timeout;
        }
        if let Some(path) = tools.notes_path {
            config.notes_path = Some(PathBuf::from(path));
        }
    }

    if let Some(render) = yaml.session.and_then(|s| s.render_markdown) {
        config.render_markdown = render;
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if let Some(max) = security.max_websocket_connections {
            config.max_websocket_connections = Some(max);
        }
        if let Some(per_ip) = security.max_connections_per_ip {
            config.max_connections_per_ip = per_ip;
        }
    }

    Ok(config)
}
