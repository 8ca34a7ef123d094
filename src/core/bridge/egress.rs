//! Egress pump: live session events to the client.
//!
//! Tool-call events are handled inline. The pump dispatches the batch,
//! writes the results back upstream and only then reads the next event, so
//! model output never overtakes the tool round-trip that precedes it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::{ClientMessage, LiveMessageRoute};
use super::session::PumpExit;
use crate::core::live::{
    ContentPart, LiveEvent, LiveInput, LiveReceiver, LiveSender, ToolCallRequest, ToolCallResult,
    ToolResultCallback,
};
use crate::core::render::{MarkupRenderer, RenderFormat};
use crate::core::tools::ToolDispatcher;

/// Whether a model response is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Open,
}

pub struct EgressPump {
    session_id: String,
    upstream: Arc<dyn LiveSender>,
    receiver: Box<dyn LiveReceiver>,
    dispatcher: Arc<ToolDispatcher>,
    renderer: Arc<dyn MarkupRenderer>,
    outbound: mpsc::Sender<LiveMessageRoute>,
    cancel: CancellationToken,
    turn: TurnState,
}

impl EgressPump {
    pub fn new(
        session_id: impl Into<String>,
        upstream: Arc<dyn LiveSender>,
        receiver: Box<dyn LiveReceiver>,
        dispatcher: Arc<ToolDispatcher>,
        renderer: Arc<dyn MarkupRenderer>,
        outbound: mpsc::Sender<LiveMessageRoute>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            upstream,
            receiver,
            dispatcher,
            renderer,
            outbound,
            cancel,
            turn: TurnState::Idle,
        }
    }

    pub async fn run(mut self) -> PumpExit {
        if let Err(exit) = self.send_client(ClientMessage::setup_complete()).await {
            return exit;
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                event = self.receiver.next_event() => event,
            };

            let step = match event {
                None => {
                    info!(session_id = %self.session_id, "Upstream session ended");
                    return PumpExit::UpstreamClosed;
                }
                Some(Err(e)) => {
                    warn!(session_id = %self.session_id, "Upstream read failed: {}", e);
                    return PumpExit::UpstreamError(e.to_string());
                }
                Some(Ok(event)) => self.handle_event(event).await,
            };

            if let Err(exit) = step {
                return exit;
            }
        }
    }

    async fn handle_event(&mut self, event: LiveEvent) -> Result<(), PumpExit> {
        match event {
            LiveEvent::ToolCall(requests) => self.handle_tool_calls(requests).await,
            LiveEvent::Content {
                parts,
                turn_complete,
                interrupted,
            } => self.handle_content(parts, turn_complete, interrupted).await,
            LiveEvent::SetupComplete => {
                debug!(session_id = %self.session_id, "Ignoring repeated setupComplete");
                Ok(())
            }
            LiveEvent::ToolCallCancellation(ids) => {
                info!(session_id = %self.session_id, ?ids, "Model cancelled tool calls");
                Ok(())
            }
            LiveEvent::GoAway { time_left } => {
                warn!(session_id = %self.session_id, ?time_left, "Upstream announced shutdown");
                Ok(())
            }
        }
    }

    async fn handle_content(
        &mut self,
        parts: Vec<ContentPart>,
        turn_complete: bool,
        interrupted: bool,
    ) -> Result<(), PumpExit> {
        if interrupted {
            info!(session_id = %self.session_id, "Model turn interrupted");
        }
        if !parts.is_empty() && self.turn == TurnState::Idle {
            self.turn = TurnState::Open;
        }

        for part in parts {
            let message = match part {
                ContentPart::Text(text) => {
                    let rendered = self.renderer.render(&text);
                    match self.renderer.format() {
                        RenderFormat::Html => ClientMessage::Json(rendered),
                        RenderFormat::Plain => ClientMessage::Text(rendered),
                    }
                }
                ContentPart::InlineData { data, .. } => ClientMessage::Audio(data),
            };
            self.send_client(message).await?;
        }

        if turn_complete {
            self.send_client(ClientMessage::turn_complete()).await?;
            self.turn = TurnState::Idle;
            debug!(session_id = %self.session_id, "Turn complete");
        }
        Ok(())
    }

    async fn handle_tool_calls(&mut self, requests: Vec<ToolCallRequest>) -> Result<(), PumpExit> {
        if requests.is_empty() {
            debug!(session_id = %self.session_id, "Empty tool call batch");
            return Ok(());
        }
        info!(
            session_id = %self.session_id,
            calls = requests.len(),
            "Dispatching tool calls"
        );

        let on_result = self.result_notifier();
        let results = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PumpExit::Cancelled),
            results = self.dispatcher.dispatch(requests, Some(&on_result)) => results,
        };

        match self.upstream.send(LiveInput::ToolResponses(results)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_terminal() => {
                warn!(session_id = %self.session_id, "Upstream closed during tool round-trip: {}", e);
                Err(PumpExit::UpstreamClosed)
            }
            Err(e) => {
                warn!(session_id = %self.session_id, "Failed to send tool responses: {}", e);
                Ok(())
            }
        }
    }

    /// Sends each finished tool result to the client as
    /// `{"text": "[<function response>]"}`.
    fn result_notifier(&self) -> ToolResultCallback {
        let outbound = self.outbound.clone();
        let session_id = self.session_id.clone();
        Arc::new(move |result: ToolCallResult| {
            let outbound = outbound.clone();
            let session_id = session_id.clone();
            Box::pin(async move {
                let notice = match serde_json::to_string(&[result.function_response()]) {
                    Ok(notice) => notice,
                    Err(e) => {
                        warn!(session_id = %session_id, "Failed to encode tool result: {}", e);
                        return;
                    }
                };
                let message = LiveMessageRoute::Outgoing(ClientMessage::Text(notice));
                if outbound.send(message).await.is_err() {
                    debug!(session_id = %session_id, "Client gone before tool result notice");
                }
            })
        })
    }

    async fn send_client(&self, message: ClientMessage) -> Result<(), PumpExit> {
        self.outbound
            .send(LiveMessageRoute::Outgoing(message))
            .await
            .map_err(|_| PumpExit::ClientGone)
    }
}
