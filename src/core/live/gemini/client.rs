//! Gemini Live WebSocket client.
//!
//! # Connection Flow
//!
//! 1. Open the socket with the API key in the query string
//! 2. Send the `setup` message and wait for `setupComplete`
//! 3. Split the socket between a writer task and a reader task
//!
//! The writer task is the only place that touches the socket sink. Both pumps
//! of a bridge session push into its channel through [`GeminiLiveSender`], so
//! upstream writes are serialised without a lock around the sink. The reader
//! task parses server frames and hands events to [`GeminiLiveReceiver`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::config::{GeminiLiveConfig, build_setup};
use super::messages::{GeminiClientMessage, GeminiServerMessage};
use crate::core::live::base::{
    LiveConnector, LiveError, LiveEvent, LiveInput, LiveReceiver, LiveResult, LiveSender,
    LiveSession, LiveSetup,
};

/// Channel capacity for messages waiting to be written upstream.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for parsed events waiting for the egress pump.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `close()` waits for the writer to flush its close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type GeminiSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Connector
// =============================================================================

/// Opens Gemini Live sessions.
#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    config: GeminiLiveConfig,
}

impl GeminiLiveConnector {
    pub fn new(config: GeminiLiveConfig) -> LiveResult<Self> {
        if config.api_key.is_empty() {
            return Err(LiveError::AuthenticationFailed(
                "Gemini API key is required".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeminiLiveConfig {
        &self.config
    }

    async fn open_socket(&self) -> LiveResult<GeminiSocket> {
        let url = self.config.connection_url()?;
        let request = url
            .as_str()
            .into_client_request()
            .map_err(|e| LiveError::ConnectionFailed(e.to_string()))?;

        let (ws_stream, _response) =
            tokio::time::timeout(self.config.connect_timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| LiveError::Timeout("connecting to Gemini Live".to_string()))?
                .map_err(|e| LiveError::ConnectionFailed(e.to_string()))?;

        Ok(ws_stream)
    }

    /// Read frames until `setupComplete` arrives.
    async fn await_setup_complete(stream: &mut SplitStream<GeminiSocket>) -> LiveResult<()> {
        while let Some(frame) = stream.next().await {
            let frame = frame.map_err(|e| LiveError::WebSocketError(e.to_string()))?;
            let Some(payload) = frame_payload(&frame) else {
                if let Message::Close(close) = frame {
                    let reason = close
                        .map(|c| c.reason.as_str().to_string())
                        .unwrap_or_else(|| "no reason".to_string());
                    return Err(LiveError::ConnectionClosed(reason));
                }
                continue;
            };

            let message: GeminiServerMessage = serde_json::from_str(payload)
                .map_err(|e| LiveError::ProtocolError(format!("Invalid setup reply: {e}")))?;
            match message.into_event() {
                Some(LiveEvent::SetupComplete) => return Ok(()),
                other => {
                    return Err(LiveError::ProtocolError(format!(
                        "Expected setupComplete, got {other:?}"
                    )));
                }
            }
        }
        Err(LiveError::ConnectionClosed(
            "closed before setupComplete".to_string(),
        ))
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(&self, setup: LiveSetup) -> LiveResult<LiveSession> {
        let ws_stream = self.open_socket().await?;
        let (mut sink, mut stream) = ws_stream.split();

        let setup_message = GeminiClientMessage::Setup(build_setup(&setup));
        let json = serde_json::to_string(&setup_message)
            .map_err(|e| LiveError::SerializationError(e.to_string()))?;
        sink.send(Message::Text(json.into()))
            .await
            .map_err(|e| LiveError::WebSocketError(e.to_string()))?;

        tokio::time::timeout(
            self.config.connect_timeout,
            Self::await_setup_complete(&mut stream),
        )
        .await
        .map_err(|_| LiveError::Timeout("waiting for setupComplete".to_string()))??;

        info!(model = %setup.model, "Connected to Gemini Live");

        let open = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel::<GeminiClientMessage>(WS_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<LiveResult<LiveEvent>>(EVENT_CHANNEL_CAPACITY);

        let writer = tokio::spawn(run_writer(sink, rx, open.clone()));
        let reader = tokio::spawn(run_reader(stream, event_tx, open.clone()));

        let sender = GeminiLiveSender {
            ws_sender: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(reader)),
            open,
        };

        Ok(LiveSession {
            sender: Arc::new(sender),
            receiver: Box::new(GeminiLiveReceiver { events: event_rx }),
        })
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

// =============================================================================
// Connection Tasks
// =============================================================================

fn frame_payload(frame: &Message) -> Option<&str> {
    match frame {
        Message::Text(text) => Some(text.as_str()),
        // Gemini delivers its JSON in binary frames
        Message::Binary(data) => std::str::from_utf8(data).ok(),
        _ => None,
    }
}

async fn run_writer(
    mut sink: SplitSink<GeminiSocket, Message>,
    mut rx: mpsc::Receiver<GeminiClientMessage>,
    open: Arc<AtomicBool>,
) {
    while let Some(message) = rx.recv().await {
        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                error!("Failed to serialize Gemini message: {}", e);
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(json.into())).await {
            error!("Failed to send Gemini WebSocket message: {}", e);
            open.store(false, Ordering::SeqCst);
            return;
        }
    }

    // Every sender is gone, so the session is being released
    if let Err(e) = sink.send(Message::Close(None)).await {
        debug!("Failed to send Gemini close frame: {}", e);
    }
    open.store(false, Ordering::SeqCst);
}

async fn run_reader(
    mut stream: SplitStream<GeminiSocket>,
    event_tx: mpsc::Sender<LiveResult<LiveEvent>>,
    open: Arc<AtomicBool>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(close)) => {
                info!(
                    reason = ?close.map(|c| c.reason.as_str().to_string()),
                    "Gemini Live closed the session"
                );
                break;
            }
            Ok(frame) => {
                let Some(payload) = frame_payload(&frame) else {
                    continue;
                };
                let message = match serde_json::from_str::<GeminiServerMessage>(payload) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Failed to parse Gemini server message: {} - {}", e, payload);
                        continue;
                    }
                };
                let Some(event) = message.into_event() else {
                    debug!("Ignoring Gemini message without actionable content");
                    continue;
                };
                if event_tx.send(Ok(event)).await.is_err() {
                    debug!("Gemini event receiver dropped, stopping reader");
                    break;
                }
            }
            Err(e) => {
                error!("Gemini WebSocket error: {}", e);
                let _ = event_tx
                    .send(Err(LiveError::WebSocketError(e.to_string())))
                    .await;
                break;
            }
        }
    }
    open.store(false, Ordering::SeqCst);
}

// =============================================================================
// Session Halves
// =============================================================================

/// Write half of a Gemini Live session.
pub struct GeminiLiveSender {
    ws_sender: Mutex<Option<mpsc::Sender<GeminiClientMessage>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl LiveSender for GeminiLiveSender {
    async fn send(&self, input: LiveInput) -> LiveResult<()> {
        let sender = self.ws_sender.lock().clone();
        let Some(sender) = sender else {
            return Err(LiveError::NotConnected);
        };

        sender
            .send(GeminiClientMessage::from(input))
            .await
            .map_err(|_| LiveError::ConnectionClosed("Gemini writer has stopped".to_string()))
    }

    async fn close(&self) -> LiveResult<()> {
        // Dropping the last sender lets the writer flush a close frame and exit
        let sender = self.ws_sender.lock().take();
        drop(sender);

        let writer = self.writer.lock().take();
        if let Some(mut writer) = writer
            && tokio::time::timeout(CLOSE_TIMEOUT, &mut writer).await.is_err()
        {
            warn!("Gemini writer did not finish in time, aborting");
            writer.abort();
        }

        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }

        self.open.store(false, Ordering::SeqCst);
        debug!("Gemini Live session released");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.ws_sender.lock().is_some()
    }
}

impl Drop for GeminiLiveSender {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.get_mut().take() {
            writer.abort();
        }
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

/// Read half of a Gemini Live session.
pub struct GeminiLiveReceiver {
    events: mpsc::Receiver<LiveResult<LiveEvent>>,
}

#[async_trait]
impl LiveReceiver for GeminiLiveReceiver {
    async fn next_event(&mut self) -> Option<LiveResult<LiveEvent>> {
        self.events.recv().await
    }
}

// =============================================================================
// Tests
// =============================================================================
