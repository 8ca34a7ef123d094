//! Configuration module for the live bridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_live_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

mod env;
mod merge;
mod validation;
mod yaml;

pub use crate::core::live::gemini::{DEFAULT_LIVE_MODEL, GEMINI_LIVE_URL as DEFAULT_LIVE_URL};
pub use crate::core::tools::DEFAULT_EXCHANGE_RATE_URL;
pub use crate::core::transcribe::{DEFAULT_GEMINI_API_BASE_URL, DEFAULT_TRANSCRIPTION_MODEL};
pub use yaml::YamlConfig;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9082;
pub const DEFAULT_TOOL_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
pub const DEFAULT_RATE_LIMIT_BURST_SIZE: u32 = 10;
pub const DEFAULT_MAX_CONNECTIONS_PER_IP: u32 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Read(String),

    #[error("{0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    InvalidValue(String),

    #[error("Missing configuration: {0}")]
    Missing(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the live bridge, including:
/// - Server settings (host, port, TLS)
/// - Gemini credentials, live model and transcription model
/// - Tool collaborator settings (exchange rate API, diary snapshot, timeout)
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Gemini settings
    /// API key used for both the live session and transcription
    pub google_api_key: Option<String>,
    /// Live model; overrides whatever model the client setup names
    pub live_model: String,
    pub live_ws_url: String,
    pub transcription_model: String,
    pub gemini_api_base_url: String,

    // Tools
    pub exchange_rate_url: String,
    pub tool_timeout_seconds: u64,
    /// Diary snapshot file. Notes live only in memory when unset.
    pub notes_path: Option<PathBuf>,

    // Session behaviour
    /// Send model text as rendered HTML (`{"json": ...}`) rather than `{"text": ...}`
    pub render_markdown: bool,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

/// Zeroize secrets when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.google_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// The Gemini API key, required to serve sessions.
    pub fn require_google_api_key(&self) -> Result<&str, ConfigError> {
        self.google_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ConfigError::Missing(
                    "GOOGLE_API_KEY (or gemini.api_key) is required".to_string(),
                )
            })
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_seconds)
    }

    /// Human readable configuration with secrets masked.
    pub fn redacted_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "address:               {}", self.address());
        let _ = writeln!(out, "tls:                   {}", self.is_tls_enabled());
        let _ = writeln!(
            out,
            "google_api_key:        {}",
            mask_secret(self.google_api_key.as_deref())
        );
        let _ = writeln!(out, "live_model:            {}", self.live_model);
        let _ = writeln!(out, "live_ws_url:           {}", self.live_ws_url);
        let _ = writeln!(out, "transcription_model:   {}", self.transcription_model);
        let _ = writeln!(out, "gemini_api_base_url:   {}", self.gemini_api_base_url);
        let _ = writeln!(out, "exchange_rate_url:     {}", self.exchange_rate_url);
        let _ = writeln!(out, "tool_timeout_seconds:  {}", self.tool_timeout_seconds);
        let _ = writeln!(
            out,
            "notes_path:            {}",
            self.notes_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(memory only)".to_string())
        );
        let _ = writeln!(out, "render_markdown:       {}", self.render_markdown);
        let _ = writeln!(
            out,
            "cors_allowed_origins:  {}",
            self.cors_allowed_origins.as_deref().unwrap_or("(disabled)")
        );
        let _ = writeln!(
            out,
            "rate_limit:            {}/s burst {}",
            self.rate_limit_requests_per_second, self.rate_limit_burst_size
        );
        let _ = writeln!(
            out,
            "max_ws_connections:    {}",
            self.max_websocket_connections
                .map(|m| m.to_string())
                .unwrap_or_else(|| "unlimited".to_string())
        );
        let _ = write!(out, "max_connections_per_ip: {}", self.max_connections_per_ip);
        out
    }
}

fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        None => "(not set)".to_string(),
        Some(s) if s.chars().count() <= 4 => "****".to_string(),
        Some(s) => {
            let tail: String = s.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("****{tail}")
        }
    }
}
