//! Configuration validation.

use super::{ConfigError, ServerConfig};

/// The transport URLs must parse and use the expected schemes.
pub(super) fn validate_urls(config: &ServerConfig) -> Result<(), ConfigError> {
    check_url("live_ws_url", &config.live_ws_url, &["ws", "wss"])?;
    check_url(
        "gemini_api_base_url",
        &config.gemini_api_base_url,
        &["http", "https"],
    )?;
    check_url(
        "exchange_rate_url",
        &config.exchange_rate_url,
        &["http", "https"],
    )
}

fn check_url(name: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = url::Url::parse(value)
        .map_err(|e| ConfigError::InvalidValue(format!("{name} '{value}' is not a URL: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidValue(format!(
            "{name} must use one of {schemes:?}, got '{}'",
            url.scheme()
        )));
    }
    Ok(())
}

pub(super) fn validate_limits(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.tool_timeout_seconds == 0 {
        return Err(ConfigError::InvalidValue(
            "tool timeout must be at least 1 second".to_string(),
        ));
    }
    if config.rate_limit_requests_per_second == 0 || config.rate_limit_burst_size == 0 {
        return Err(ConfigError::InvalidValue(
            "rate limit values must be greater than zero".to_string(),
        ));
    }
    if config.max_connections_per_ip == 0 {
        return Err(ConfigError::InvalidValue(
            "max_connections_per_ip must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// TLS files must exist when TLS is enabled.
pub(super) fn validate_tls(config: &ServerConfig) -> Result<(), ConfigError> {
    let Some(tls) = &config.tls else {
        return Ok(());
    };
    for (name, path) in [("certificate", &tls.cert_path), ("private key", &tls.key_path)] {
        if !path.exists() {
            return Err(ConfigError::InvalidValue(format!(
                "TLS {name} not found: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_urls(config)?;
    validate_limits(config)?;
    validate_tls(config)
}
