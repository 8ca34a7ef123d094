use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional so a file can override only what it needs.
/// Values here take precedence over environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 9082
///   tls:
///     cert_path: "/etc/certs/server.pem"
///     key_path: "/etc/certs/server.key"
///
/// gemini:
///   api_key: "your-google-api-key"
///   live_model: "gemini-2.0-flash-exp"
///   live_url: "wss://generativelanguage.googleapis.com/ws/..."
///   transcription_model: "gemini-1.5-flash-8b"
///   api_base_url: "https://generativelanguage.googleapis.com"
///
/// tools:
///   exchange_rate_url: "https://api.frankfurter.app"
///   timeout_seconds: 30
///   notes_path: "/var/lib/live-bridge/notes.json"
///
/// session:
///   render_markdown: true
///
/// security:
///   cors_allowed_origins: "https://example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub tools: Option<ToolsYaml>,
    pub session: Option<SessionYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Gemini credentials and model selection from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub live_model: Option<String>,
    pub live_url: Option<String>,
    pub transcription_model: Option<String>,
    pub api_base_url: Option<String>,
}

/// Tool collaborator settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ToolsYaml {
    pub exchange_rate_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Diary snapshot file; memory only when absent
    pub notes_path: Option<String>,
}

/// Per-session behaviour from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    /// Send model text as HTML (`json`) instead of raw `text`
    pub render_markdown: Option<bool>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
    /// Maximum concurrent WebSocket connections
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Read(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML config: {e}")))?;

        Ok(config)
    }
}
