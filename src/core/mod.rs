pub mod bridge;
pub mod live;
pub mod render;
pub mod tools;
pub mod transcribe;

// Re-export commonly used types for convenience
pub use bridge::{
    BridgeContext, ClientFrame, ClientMessage, HandshakeError, LiveMessageRoute, PumpExit,
    SessionBridge, SessionState,
};

pub use live::{
    ContentPart, GeminiLiveConfig, GeminiLiveConnector, LiveConnector, LiveError, LiveEvent,
    LiveInput, LiveReceiver, LiveResult, LiveSender, LiveSession, LiveSetup, ToolCallRequest,
    ToolCallResult, ToolOutcome, create_live_connector,
};

pub use render::{HtmlRenderer, MarkupRenderer, PlainRenderer, RenderFormat};

pub use tools::{
    ExchangeRateClient, InMemoryNoteStore, NoteStore, ToolDispatcher, ToolError, ToolHandler,
    ToolRegistry, ToolResult, build_default_registry,
};

pub use transcribe::{GeminiTranscriber, TranscribeError, Transcriber};
