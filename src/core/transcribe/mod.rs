//! Side-channel transcription of client audio.
//!
//! `audio/transcribe` chunks never reach the live session. They are wrapped
//! as WAV and sent to a one-shot transcription call, and the text goes back
//! to the client as `{"transcribe_json": ...}`.

pub mod gemini;
pub mod wav;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{
    DEFAULT_GEMINI_API_BASE_URL, DEFAULT_TRANSCRIPTION_MODEL, GeminiTranscriber,
    TRANSCRIPTION_PROMPT,
};

#[derive(Debug, Error)]
pub enum TranscribeError {
    /// Payload was not valid base64
    #[error("invalid audio payload: {0}")]
    InvalidAudio(String),

    #[error("transcription request failed: {0}")]
    RequestFailed(String),

    #[error("transcription service returned {status}: {message}")]
    ServiceError { status: u16, message: String },

    #[error("unexpected transcription response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type TranscribeResult<T> = Result<T, TranscribeError>;

/// One-shot speech to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe base64-encoded 16kHz mono PCM.
    async fn transcribe(&self, pcm_base64: &str) -> TranscribeResult<String>;

    fn provider_name(&self) -> &'static str;
}
