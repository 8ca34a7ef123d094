//! Client-facing message types for the live bridge.
//!
//! Inbound frames are JSON envelopes carrying either the one-time `setup`
//! object or `realtime_input.media_chunks`. Outbound messages are single-key
//! JSON objects (`{"text": ...}`, `{"audio": ...}` and so on).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Incoming Messages
// =============================================================================

/// Any JSON frame sent by the client.
///
/// Both snake_case and camelCase keys are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientEnvelope {
    /// Session configuration; only meaningful as the first frame
    #[serde(default)]
    pub setup: Option<Value>,

    #[serde(default, alias = "realtimeInput")]
    pub realtime_input: Option<RealtimeInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealtimeInput {
    #[serde(default, alias = "mediaChunks")]
    pub media_chunks: Vec<RawMediaChunk>,
}

/// A media chunk as received, before classification.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawMediaChunk {
    #[serde(default, alias = "mimeType")]
    pub mime_type: Option<String>,

    /// Base64 text for media, free text (or JSON) for `application/json`
    #[serde(default)]
    pub data: Option<Value>,
}

impl RawMediaChunk {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            data: Some(data.into()),
        }
    }
}

/// A transport frame from the client, already stripped of ping/pong.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Text(String),
    /// Raw 16-bit PCM audio
    Binary(Bytes),
    Close,
}

// =============================================================================
// Outgoing Messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerContentSignal {
    #[serde(rename = "turnComplete")]
    pub turn_complete: bool,
}

/// Messages sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Upstream session is open; always the string `"true"`
    #[serde(rename = "setupComplete")]
    SetupComplete(String),

    /// Raw model text, or a tool result notification
    #[serde(rename = "text")]
    Text(String),

    /// Rendered model text
    #[serde(rename = "json")]
    Json(String),

    /// Base64 audio from the model
    #[serde(rename = "audio")]
    Audio(String),

    /// Side-channel transcription of client audio
    #[serde(rename = "transcribe_json")]
    TranscribeJson(String),

    #[serde(rename = "serverContent")]
    ServerContent(ServerContentSignal),
}

impl ClientMessage {
    pub fn setup_complete() -> Self {
        ClientMessage::SetupComplete("true".to_string())
    }

    pub fn turn_complete() -> Self {
        ClientMessage::ServerContent(ServerContentSignal {
            turn_complete: true,
        })
    }
}

/// Routing for the per-connection writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveMessageRoute {
    /// JSON text message
    Outgoing(ClientMessage),
    /// Close connection
    Close,
}
