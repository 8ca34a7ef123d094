//! Gemini Live provider.
//!
//! Streams audio, images and text into a Gemini `BidiGenerateContent` session
//! and reads back model text, inline audio and function calls.
//!
//! # Endpoint
//!
//! `wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent?key=<API_KEY>`

mod client;
mod config;
pub mod messages;

pub use client::{GeminiLiveConnector, GeminiLiveReceiver, GeminiLiveSender};
pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_LIVE_MODEL, GEMINI_LIVE_URL, GeminiLiveConfig, build_setup,
    model_resource,
};
