//! Live streaming model sessions.
//!
//! # Architecture
//!
//! - `LiveConnector` opens a session and returns its two halves
//! - `LiveSender` is shared by both bridge pumps and serialises writes
//! - `LiveReceiver` is owned by the egress pump
//!
//! # Example
//!
//! ```rust,ignore
//! use waav_live_bridge::core::live::{create_live_connector, LiveSetup};
//!
//! let connector = create_live_connector("gemini", GeminiLiveConfig::new(api_key))?;
//! let session = connector.connect(LiveSetup { model, config, tools }).await?;
//! ```

mod base;
pub mod gemini;

use std::sync::Arc;

pub use base::{
    ContentPart, LiveConnector, LiveError, LiveEvent, LiveInput, LiveReceiver, LiveResult,
    LiveSender, LiveSession, LiveSetup, ToolArguments, ToolCallRequest, ToolCallResult,
    ToolOutcome, ToolResultCallback,
};
pub use gemini::{GeminiLiveConfig, GeminiLiveConnector};

/// Supported live providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveProvider {
    Gemini,
}

impl LiveProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" | "gemini-live" => Some(LiveProvider::Gemini),
            _ => None,
        }
    }
}

impl std::fmt::Display for LiveProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveProvider::Gemini => write!(f, "gemini"),
        }
    }
}

/// Create a live connector by provider name.
pub fn create_live_connector(
    provider: &str,
    config: GeminiLiveConfig,
) -> LiveResult<Arc<dyn LiveConnector>> {
    match LiveProvider::parse(provider) {
        Some(LiveProvider::Gemini) => Ok(Arc::new(GeminiLiveConnector::new(config)?)),
        None => Err(LiveError::InvalidConfiguration(format!(
            "Unknown live provider: {provider}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(LiveProvider::parse("gemini"), Some(LiveProvider::Gemini));
        assert_eq!(LiveProvider::parse("GEMINI"), Some(LiveProvider::Gemini));
        assert_eq!(LiveProvider::parse("google"), Some(LiveProvider::Gemini));
        assert_eq!(LiveProvider::parse("openai"), None);
    }

    #[test]
    fn test_create_live_connector() {
        let connector = create_live_connector("gemini", GeminiLiveConfig::new("key")).unwrap();
        assert_eq!(connector.provider_name(), "gemini");

        assert!(create_live_connector("invalid", GeminiLiveConfig::new("key")).is_err());
        assert!(create_live_connector("gemini", GeminiLiveConfig::new("")).is_err());
    }
}
