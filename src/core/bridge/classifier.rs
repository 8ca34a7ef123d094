//! MediaChunk classification.
//!
//! Maps a raw `{mime_type, data}` chunk to the action the ingress pump takes.
//! Matching uses the mime essence (parameters after `;` are ignored) and is
//! case-insensitive, but the original mime string is kept for forwarding.

use serde_json::Value;
use thiserror::Error;

use super::messages::RawMediaChunk;
use crate::core::live::LiveInput;

pub const MIME_PCM_AUDIO: &str = "audio/pcm";
pub const MIME_JPEG_IMAGE: &str = "image/jpeg";
pub const MIME_TRANSCRIBE: &str = "audio/transcribe";
pub const MIME_STRUCTURED_TEXT: &str = "application/json";

/// A classified client chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaChunk {
    /// Streaming microphone audio, base64 PCM
    PcmAudio { mime_type: String, data: String },
    /// Camera or screen frame, base64 JPEG
    JpegImage { data: String },
    /// Audio to transcribe out of band, base64 PCM
    TranscriptionRequest { data: String },
    /// Typed user text, sent upstream as a complete turn
    StructuredText { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("unknown mime type: {0}")]
    UnknownMimeType(String),

    #[error("chunk has no data")]
    MissingData,

    #[error("chunk data for {0} must be a string")]
    InvalidData(String),
}

/// Classify one chunk.
pub fn classify(chunk: &RawMediaChunk) -> Result<MediaChunk, ClassifyError> {
    let mime_type = chunk.mime_type.as_deref().unwrap_or_default().trim();
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let known = matches!(
        essence.as_str(),
        MIME_PCM_AUDIO | MIME_JPEG_IMAGE | MIME_TRANSCRIBE | MIME_STRUCTURED_TEXT
    );
    if !known {
        return Err(ClassifyError::UnknownMimeType(mime_type.to_string()));
    }

    let data = match &chunk.data {
        None | Some(Value::Null) => return Err(ClassifyError::MissingData),
        Some(data) => data,
    };

    if essence == MIME_STRUCTURED_TEXT {
        let text = match data {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Ok(MediaChunk::StructuredText { text });
    }

    let Value::String(payload) = data else {
        return Err(ClassifyError::InvalidData(essence));
    };
    let payload = payload.clone();

    Ok(match essence.as_str() {
        MIME_PCM_AUDIO => MediaChunk::PcmAudio {
            mime_type: mime_type.to_string(),
            data: payload,
        },
        MIME_JPEG_IMAGE => MediaChunk::JpegImage { data: payload },
        _ => MediaChunk::TranscriptionRequest { data: payload },
    })
}

impl MediaChunk {
    pub fn kind(&self) -> &'static str {
        match self {
            MediaChunk::PcmAudio { .. } => "pcm_audio",
            MediaChunk::JpegImage { .. } => "jpeg_image",
            MediaChunk::TranscriptionRequest { .. } => "transcription_request",
            MediaChunk::StructuredText { .. } => "structured_text",
        }
    }

    /// Upstream input for this chunk. `None` for transcription requests,
    /// which never reach the live session.
    pub fn into_live_input(self) -> Option<LiveInput> {
        match self {
            MediaChunk::PcmAudio { mime_type, data } => Some(LiveInput::Media { mime_type, data }),
            MediaChunk::JpegImage { data } => Some(LiveInput::Media {
                mime_type: MIME_JPEG_IMAGE.to_string(),
                data,
            }),
            MediaChunk::StructuredText { text } => Some(LiveInput::Text {
                text,
                end_of_turn: true,
            }),
            MediaChunk::TranscriptionRequest { .. } => None,
        }
    }
}
