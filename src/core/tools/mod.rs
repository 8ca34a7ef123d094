//! Tools the model can call during a live session.
//!
//! # Architecture
//!
//! - `ToolHandler` is the per-tool capability set (validate, execute, format)
//! - `ToolRegistry` is built once at startup and shared read-only
//! - `ToolDispatcher` runs one tool-call batch and never fails as a whole
//!
//! # Built-in Tools
//!
//! - `write_to_diary` / `find_in_diary` over a [`NoteStore`]
//! - `get_exchange_rate` over the Frankfurter API

pub mod dates;
pub mod diary;
pub mod dispatcher;
pub mod exchange_rate;
pub mod handler;
pub mod notes;
pub mod registry;

use std::sync::Arc;
use thiserror::Error;

pub use diary::{
    FIND_IN_DIARY, FindInDiaryTool, NOTHING_FOUND, SAVED_TO_DIARY, WRITE_TO_DIARY, WriteToDiaryTool,
};
pub use dispatcher::{DEFAULT_TOOL_TIMEOUT, ToolDispatcher, UNKNOWN_TOOL};
pub use exchange_rate::{
    DEFAULT_EXCHANGE_RATE_URL, ExchangeRateClient, GET_EXCHANGE_RATE, GetExchangeRateTool,
};
pub use handler::{FunctionDeclaration, ToolHandler};
pub use notes::{InMemoryNoteStore, Note, NoteStore};
pub use registry::{ToolRegistry, ToolRegistryBuilder};

/// Errors raised by tool handlers and the registry.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("tool execution failed: {0}")]
    Execution(String),

    /// A remote service behind the tool failed
    #[error("upstream service error: {0}")]
    Upstream(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("tool execution timed out after {0}s")]
    Timeout(u64),

    #[error("tool panicked: {0}")]
    Panicked(String),

    #[error("tool registration failed: {0}")]
    Registration(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Registry holding the diary tools and the exchange rate tool.
pub fn build_default_registry(
    store: Arc<dyn NoteStore>,
    exchange_rates: ExchangeRateClient,
) -> ToolResult<ToolRegistry> {
    Ok(ToolRegistry::builder()
        .register(Arc::new(WriteToDiaryTool::new(store.clone())))?
        .register(Arc::new(FindInDiaryTool::new(store)))?
        .register(exchange_rate::exchange_rate_tool(exchange_rates))?
        .build())
}
