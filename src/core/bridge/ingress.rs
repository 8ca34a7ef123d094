//! Ingress pump: client frames to the live session.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classifier::{MIME_PCM_AUDIO, MediaChunk, classify};
use super::messages::{ClientEnvelope, ClientFrame, ClientMessage, LiveMessageRoute};
use super::session::PumpExit;
use crate::core::live::{LiveInput, LiveSender};
use crate::core::transcribe::Transcriber;

/// Reads client frames until the client goes away or the session is
/// cancelled. A bad frame or chunk is logged and skipped.
pub struct IngressPump {
    session_id: String,
    upstream: Arc<dyn LiveSender>,
    transcriber: Arc<dyn Transcriber>,
    outbound: mpsc::Sender<LiveMessageRoute>,
    cancel: CancellationToken,
}

impl IngressPump {
    pub fn new(
        session_id: impl Into<String>,
        upstream: Arc<dyn LiveSender>,
        transcriber: Arc<dyn Transcriber>,
        outbound: mpsc::Sender<LiveMessageRoute>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            upstream,
            transcriber,
            outbound,
            cancel,
        }
    }

    pub async fn run<S>(self, mut inbound: S) -> PumpExit
    where
        S: Stream<Item = ClientFrame> + Unpin,
    {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                frame = inbound.next() => frame,
            };

            let step = match frame {
                None | Some(ClientFrame::Close) => {
                    info!(session_id = %self.session_id, "Client closed the connection");
                    return PumpExit::ClientClosed;
                }
                Some(ClientFrame::Text(text)) => self.handle_text(&text).await,
                Some(ClientFrame::Binary(data)) => self.handle_binary(data).await,
            };

            if let Err(exit) = step {
                return exit;
            }
        }
    }

    async fn handle_text(&self, text: &str) -> Result<(), PumpExit> {
        let envelope: ClientEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(session_id = %self.session_id, "Ignoring malformed client frame: {}", e);
                return Ok(());
            }
        };

        if envelope.setup.is_some() {
            warn!(session_id = %self.session_id, "Ignoring setup message on an active session");
        }

        let Some(input) = envelope.realtime_input else {
            debug!(session_id = %self.session_id, "Skipping client frame without realtime_input");
            return Ok(());
        };

        for raw in &input.media_chunks {
            match classify(raw) {
                Ok(chunk) => self.route(chunk).await?,
                Err(e) => warn!(
                    session_id = %self.session_id,
                    mime_type = ?raw.mime_type,
                    "Dropping media chunk: {}",
                    e
                ),
            }
        }
        Ok(())
    }

    async fn handle_binary(&self, data: Bytes) -> Result<(), PumpExit> {
        if data.is_empty() {
            return Ok(());
        }
        self.forward(LiveInput::Media {
            mime_type: MIME_PCM_AUDIO.to_string(),
            data: BASE64.encode(&data),
        })
        .await
    }

    async fn route(&self, chunk: MediaChunk) -> Result<(), PumpExit> {
        if let MediaChunk::TranscriptionRequest { data } = chunk {
            return self.transcribe(&data).await;
        }

        let kind = chunk.kind();
        match chunk.into_live_input() {
            Some(input) => {
                debug!(session_id = %self.session_id, kind, "Forwarding chunk upstream");
                self.forward(input).await
            }
            None => Ok(()),
        }
    }

    async fn forward(&self, input: LiveInput) -> Result<(), PumpExit> {
        match self.upstream.send(input).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_terminal() => {
                warn!(session_id = %self.session_id, "Upstream session closed: {}", e);
                Err(PumpExit::UpstreamClosed)
            }
            Err(e) => {
                warn!(session_id = %self.session_id, "Failed to forward chunk upstream: {}", e);
                Ok(())
            }
        }
    }

    /// Awaited inline so the transcript keeps its place among client-bound
    /// messages from this pump.
    async fn transcribe(&self, data: &str) -> Result<(), PumpExit> {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PumpExit::Cancelled),
            result = self.transcriber.transcribe(data) => result,
        };

        match result {
            Ok(text) => {
                let message = LiveMessageRoute::Outgoing(ClientMessage::TranscribeJson(text));
                if self.outbound.send(message).await.is_err() {
                    return Err(PumpExit::ClientGone);
                }
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %self.session_id, "Transcription failed: {}", e);
                Ok(())
            }
        }
    }
}
