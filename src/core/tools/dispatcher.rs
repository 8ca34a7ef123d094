//! Tool Dispatcher
//!
//! Runs a batch of tool calls from one model event and returns one result
//! per request, in request order. Nothing a handler does can fail the batch:
//! unknown names, invalid arguments, errors, panics and timeouts all become
//! failure results.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};

use super::ToolError;
use super::registry::ToolRegistry;
use crate::core::live::{ToolCallRequest, ToolCallResult, ToolResultCallback};

/// Failure text for names missing from the registry.
pub const UNKNOWN_TOOL: &str = "unknown tool";

/// Default per-call execution limit.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every request in arrival order.
    ///
    /// `on_result` is awaited for each result as soon as it is known, before
    /// the next request starts.
    pub async fn dispatch(
        &self,
        requests: Vec<ToolCallRequest>,
        on_result: Option<&ToolResultCallback>,
    ) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(requests.len());

        for request in requests {
            let result = self.dispatch_one(&request).await;
            if let Some(callback) = on_result {
                callback(result.clone()).await;
            }
            results.push(result);
        }

        results
    }

    async fn dispatch_one(&self, request: &ToolCallRequest) -> ToolCallResult {
        let Some(handler) = self.registry.get(&request.name) else {
            warn!(tool = %request.name, call_id = %request.call_id, "Unknown tool requested");
            return ToolCallResult::failure(request, UNKNOWN_TOOL);
        };

        if let Err(e) = handler.validate(&request.arguments) {
            warn!(tool = %request.name, call_id = %request.call_id, "Invalid tool arguments: {}", e);
            return ToolCallResult::failure(request, e.to_string());
        }

        let started = Instant::now();
        let arguments = request.arguments.clone();
        let task_handler = handler.clone();
        // Own task so a panicking handler only fails its own call. The task
        // dies with this future when the caller stops waiting.
        let mut task =
            AbortOnDropHandle::new(tokio::spawn(async move { task_handler.execute(arguments).await }));

        let outcome: Result<Value, ToolError> =
            match tokio::time::timeout(self.timeout, &mut task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(ToolError::Panicked(join_error.to_string())),
                Err(_) => {
                    task.abort();
                    Err(ToolError::Timeout(self.timeout.as_secs()))
                }
            };

        let elapsed_ms = started.elapsed().as_millis();
        match outcome {
            Ok(raw) => {
                info!(
                    tool = %request.name,
                    call_id = %request.call_id,
                    elapsed_ms = elapsed_ms as u64,
                    "Tool executed"
                );
                ToolCallResult::success(request, handler.format_result(raw))
            }
            Err(e) => {
                warn!(
                    tool = %request.name,
                    call_id = %request.call_id,
                    elapsed_ms = elapsed_ms as u64,
                    "Tool failed: {}",
                    e
                );
                debug!(error = ?e, "Tool failure detail");
                ToolCallResult::failure(request, e.to_string())
            }
        }
    }
}
