//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `live` - Live session WebSocket bridged to Gemini Live

pub mod api;
pub mod live;

pub use live::live_handler;
