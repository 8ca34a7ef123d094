//! Base traits and types for live streaming model sessions.
//!
//! A live session is a long-lived bidirectional connection to a hosted model.
//! The bridge writes media, text and tool responses into it through a
//! [`LiveSender`] and reads model output through a [`LiveReceiver`]. Both halves
//! come out of a single [`LiveConnector::connect`] call.
//!
//! # Wire Model
//!
//! - Media is forwarded as base64 payloads tagged with a mime type
//! - Text is sent as a complete user turn
//! - Tool results are sent back as one batch per tool-call event

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to a live session.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider sent something that breaks the protocol
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Session was never opened or has already been released
    #[error("Not connected")]
    NotConnected,

    /// The provider closed the session
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
}

impl LiveError {
    /// Whether the error means the session can no longer carry traffic.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LiveError::NotConnected | LiveError::ConnectionClosed(_) | LiveError::WebSocketError(_)
        )
    }
}

/// Result type for live session operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Tool Call Types
// =============================================================================

/// Ordered tool-call arguments as sent by the model.
pub type ToolArguments = Map<String, Value>;

/// A single function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier echoed back in the matching result
    pub call_id: String,
    /// Name of the tool to run
    pub name: String,
    /// Arguments in the order the model produced them
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCallRequest {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutcome {
    Success,
    Failure,
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOutcome::Success => write!(f, "success"),
            ToolOutcome::Failure => write!(f, "failure"),
        }
    }
}

/// Result of one tool call, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub call_id: String,
    pub name: String,
    pub outcome: ToolOutcome,
    /// Present on success
    pub result: Option<Value>,
    /// Present on failure
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn success(request: &ToolCallRequest, result: Value) -> Self {
        Self {
            call_id: request.call_id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Success,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(request: &ToolCallRequest, error: impl Into<String>) -> Self {
        Self {
            call_id: request.call_id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Failure,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ToolOutcome::Success
    }

    /// The `response` object sent back to the model.
    ///
    /// Successes become `{"result": ...}`, failures `{"error": "..."}`.
    pub fn response_payload(&self) -> Value {
        let mut payload = Map::new();
        match self.outcome {
            ToolOutcome::Success => {
                payload.insert(
                    "result".to_string(),
                    self.result.clone().unwrap_or(Value::Null),
                );
            }
            ToolOutcome::Failure => {
                payload.insert(
                    "error".to_string(),
                    Value::String(self.error.clone().unwrap_or_default()),
                );
            }
        }
        Value::Object(payload)
    }

    /// Function response shape shared by the upstream reply and the client
    /// side-channel: `{"name", "response", "id"}`.
    pub fn function_response(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("name".to_string(), Value::String(self.name.clone()));
        entry.insert("response".to_string(), self.response_payload());
        entry.insert("id".to_string(), Value::String(self.call_id.clone()));
        Value::Object(entry)
    }
}

// =============================================================================
// Session Input / Output
// =============================================================================

/// Everything the bridge can write into a live session.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveInput {
    /// Streaming media chunk (base64 payload)
    Media { mime_type: String, data: String },
    /// Text content; `end_of_turn` asks the model to respond
    Text { text: String, end_of_turn: bool },
    /// Results for a previously received tool-call event, in request order
    ToolResponses(Vec<ToolCallResult>),
}

/// One part of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Inline media, base64 encoded as received
    InlineData { mime_type: String, data: String },
}

/// Events read from a live session.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Provider acknowledged the setup message
    SetupComplete,
    /// Model output; `turn_complete` closes the current turn after these parts
    Content {
        parts: Vec<ContentPart>,
        turn_complete: bool,
        interrupted: bool,
    },
    /// The model wants these tools run before it continues
    ToolCall(Vec<ToolCallRequest>),
    /// The model withdrew earlier tool calls
    ToolCallCancellation(Vec<String>),
    /// Provider announced it will close the session soon
    GoAway { time_left: Option<String> },
}

/// Parameters for opening a live session.
#[derive(Debug, Clone)]
pub struct LiveSetup {
    /// Model identifier, with or without the `models/` prefix
    pub model: String,
    /// Client supplied setup object, forwarded verbatim
    pub config: Value,
    /// Tool declaration groups merged into the setup's `tools` list
    pub tools: Vec<Value>,
}

// =============================================================================
// Traits
// =============================================================================

/// Write half of a live session.
///
/// Implementations serialise writes internally so both pumps can share one
/// sender through an `Arc`.
#[async_trait]
pub trait LiveSender: Send + Sync {
    async fn send(&self, input: LiveInput) -> LiveResult<()>;

    /// Release the session. Safe to call more than once.
    async fn close(&self) -> LiveResult<()>;

    fn is_open(&self) -> bool;
}

/// Read half of a live session.
#[async_trait]
pub trait LiveReceiver: Send + Sync {
    /// Next event, or `None` once the provider has closed the stream.
    async fn next_event(&mut self) -> Option<LiveResult<LiveEvent>>;
}

/// An opened live session.
pub struct LiveSession {
    pub sender: Arc<dyn LiveSender>,
    pub receiver: Box<dyn LiveReceiver>,
}

/// Opens live sessions against a provider.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self, setup: LiveSetup) -> LiveResult<LiveSession>;

    fn provider_name(&self) -> &'static str;
}

/// Callback invoked for every finished tool call.
pub type ToolResultCallback =
    Arc<dyn Fn(ToolCallResult) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ToolCallRequest {
        ToolCallRequest::new("call-1", "write_to_diary", Map::new())
    }

    #[test]
    fn test_success_payload() {
        let result = ToolCallResult::success(&request(), json!("Saved to diary"));
        assert!(result.is_success());
        assert_eq!(result.response_payload(), json!({"result": "Saved to diary"}));
    }

    #[test]
    fn test_failure_payload() {
        let result = ToolCallResult::failure(&request(), "unknown tool");
        assert!(!result.is_success());
        assert_eq!(result.response_payload(), json!({"error": "unknown tool"}));
    }

    #[test]
    fn test_function_response_field_order() {
        let result = ToolCallResult::success(&request(), json!(1));
        let text = serde_json::to_string(&result.function_response()).unwrap();
        assert_eq!(
            text,
            r#"{"name":"write_to_diary","response":{"result":1},"id":"call-1"}"#
        );
    }

    #[test]
    fn test_error_display() {
        let err = LiveError::ConnectionFailed("test".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = LiveError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn test_terminal_errors() {
        assert!(LiveError::NotConnected.is_terminal());
        assert!(LiveError::ConnectionClosed("bye".into()).is_terminal());
        assert!(!LiveError::SerializationError("bad".into()).is_terminal());
    }
}
