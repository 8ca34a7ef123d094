//! Environment variable loading.
//!
//! `.env` is loaded into the process environment by `main` before this runs,
//! so actual environment variables already take precedence over it here.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{
    ConfigError, DEFAULT_EXCHANGE_RATE_URL, DEFAULT_GEMINI_API_BASE_URL, DEFAULT_HOST,
    DEFAULT_LIVE_MODEL, DEFAULT_LIVE_URL, DEFAULT_MAX_CONNECTIONS_PER_IP, DEFAULT_PORT,
    DEFAULT_RATE_LIMIT_BURST_SIZE, DEFAULT_RATE_LIMIT_RPS, DEFAULT_TOOL_TIMEOUT_SECONDS,
    DEFAULT_TRANSCRIPTION_MODEL, ServerConfig, TlsConfig,
};

/// Non-empty, trimmed value of `key`.
pub(super) fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                ConfigError::InvalidValue(format!("{key}='{raw}' is not valid: {e}"))
            })
        })
        .transpose()
}

pub(super) fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!(
            "{key}='{other}' is not a boolean"
        ))),
    }
}

fn tls_from_env() -> Result<Option<TlsConfig>, ConfigError> {
    match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        _ => Err(ConfigError::InvalidValue(
            "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
        )),
    }
}

/// Build a configuration from environment variables and defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, ConfigError> {
    let render_markdown = match env_var("RENDER_MARKDOWN") {
        Some(raw) => parse_bool("RENDER_MARKDOWN", &raw)?,
        None => true,
    };

    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_var("PORT")?.unwrap_or(DEFAULT_PORT),
        tls: tls_from_env()?,

        google_api_key: env_var("GOOGLE_API_KEY"),
        live_model: env_var("LIVE_MODEL").unwrap_or_else(|| DEFAULT_LIVE_MODEL.to_string()),
        live_ws_url: env_var("LIVE_WS_URL").unwrap_or_else(|| DEFAULT_LIVE_URL.to_string()),
        transcription_model: env_var("TRANSCRIPTION_MODEL")
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
        gemini_api_base_url: env_var("GEMINI_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE_URL.to_string()),

        exchange_rate_url: env_var("EXCHANGE_RATE_URL")
            .unwrap_or_else(|| DEFAULT_EXCHANGE_RATE_URL.to_string()),
        tool_timeout_seconds: parse_var("TOOL_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECONDS),
        notes_path: env_var("NOTES_PATH").map(PathBuf::from),

        render_markdown,

        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: parse_var("RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS),
        rate_limit_burst_size: parse_var("RATE_LIMIT_BURST_SIZE")?
            .unwrap_or(DEFAULT_RATE_LIMIT_BURST_SIZE),
        max_websocket_connections: parse_var("MAX_WEBSOCKET_CONNECTIONS")?,
        max_connections_per_ip: parse_var("MAX_CONNECTIONS_PER_IP")?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS_PER_IP),
    })
}
