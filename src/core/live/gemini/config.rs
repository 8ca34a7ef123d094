//! Gemini Live connection settings and setup message construction.

use serde_json::{Map, Value};
use std::time::Duration;

use crate::core::live::base::{LiveError, LiveResult, LiveSetup};

/// Gemini Live bidirectional streaming endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Model used when none is configured.
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.0-flash-exp";

/// How long to wait for the socket and the `setupComplete` acknowledgement.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for [`super::GeminiLiveConnector`].
#[derive(Debug, Clone)]
pub struct GeminiLiveConfig {
    pub api_key: String,
    pub ws_url: String,
    pub connect_timeout: Duration,
}

impl GeminiLiveConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ws_url: GEMINI_LIVE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Endpoint URL with the API key attached as a query parameter.
    pub fn connection_url(&self) -> LiveResult<url::Url> {
        let mut url = url::Url::parse(&self.ws_url)
            .map_err(|e| LiveError::InvalidConfiguration(format!("Invalid live URL: {e}")))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

/// Prefix a bare model id with `models/`.
pub fn model_resource(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// Build the body of the `setup` message.
///
/// The client's setup object is kept as is, the configured model is written
/// into `model`, and the server tool groups are appended to whatever `tools`
/// the client already declared.
pub fn build_setup(setup: &LiveSetup) -> Map<String, Value> {
    let mut body = match &setup.config {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    body.insert(
        "model".to_string(),
        Value::String(model_resource(&setup.model)),
    );

    if !setup.tools.is_empty() {
        let mut tools = match body.remove("tools") {
            Some(Value::Array(existing)) => existing,
            _ => Vec::new(),
        };
        tools.extend(setup.tools.iter().cloned());
        body.insert("tools".to_string(), Value::Array(tools));
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup(config: Value, tools: Vec<Value>) -> LiveSetup {
        LiveSetup {
            model: "gemini-2.0-flash-exp".to_string(),
            config,
            tools,
        }
    }

    #[test]
    fn test_model_resource() {
        assert_eq!(model_resource("gemini-2.0-flash-exp"), "models/gemini-2.0-flash-exp");
        assert_eq!(model_resource("models/x"), "models/x");
    }

    #[test]
    fn test_build_setup_keeps_client_fields() {
        let body = build_setup(&setup(
            json!({"generation_config": {"response_modalities": ["AUDIO"]}}),
            vec![json!({"function_declarations": [{"name": "write_to_diary"}]})],
        ));

        assert_eq!(body["model"], json!("models/gemini-2.0-flash-exp"));
        assert_eq!(
            body["generation_config"],
            json!({"response_modalities": ["AUDIO"]})
        );
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_build_setup_appends_to_client_tools() {
        let body = build_setup(&setup(
            json!({"tools": [{"google_search": {}}]}),
            vec![json!({"function_declarations": []})],
        ));

        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0], json!({"google_search": {}}));
    }

    #[test]
    fn test_build_setup_non_object_config() {
        let body = build_setup(&setup(json!("nonsense"), vec![]));
        assert_eq!(body.len(), 1);
        assert!(body.contains_key("model"));
    }

    #[test]
    fn test_connection_url_carries_key() {
        let config = GeminiLiveConfig::new("secret").with_ws_url("ws://127.0.0.1:9000/live");
        let url = config.connection_url().unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9000/live?key=secret");
    }

    #[test]
    fn test_connection_url_invalid() {
        let config = GeminiLiveConfig::new("secret").with_ws_url("not a url");
        assert!(matches!(
            config.connection_url(),
            Err(LiveError::InvalidConfiguration(_))
        ));
    }
}
