//! Live session WebSocket handler
//!
//! Bridges one client WebSocket to one Gemini Live session.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **setup**: first frame, `{"setup": {...}}`, forwarded upstream with the
//!   server's model and tool declarations applied
//! - **realtime_input**: `{"realtime_input": {"media_chunks": [...]}}` with
//!   `audio/pcm`, `image/jpeg`, `audio/transcribe` or `application/json` chunks
//! - **Binary frames**: raw PCM audio
//!
//! ## Server → Client
//!
//! - `{"setupComplete": "true"}` once the upstream session is open
//! - `{"text": ...}` / `{"json": ...}` model text, raw or rendered
//! - `{"audio": ...}` base64 model audio
//! - `{"transcribe_json": ...}` transcription of an `audio/transcribe` chunk
//! - `{"serverContent": {"turnComplete": true}}` after each model turn

mod handler;

pub use handler::live_handler;
