//! Live WebSocket handler
//!
//! Upgrades the connection, runs a writer task that owns the socket sink,
//! and hands the socket stream to a [`SessionBridge`].

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{debug, error, info, warn};

use crate::core::bridge::{ClientFrame, LiveMessageRoute, SessionBridge};
use crate::middleware::SessionSlot;
use crate::state::AppState;

/// Channel buffer for outgoing client messages
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Time allowed for the writer task to flush the close frame
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type ClientStream = Pin<Box<dyn Stream<Item = ClientFrame> + Send>>;

/// Live WebSocket handler
///
/// # Arguments
/// * `ws` - The WebSocket upgrade request from Axum
/// * `state` - Application state with the shared bridge context
/// * `slot` - Reserved by the session limit middleware; held until the socket task ends
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<SessionSlot>>,
) -> Response {
    let slot = slot.map(|Extension(slot)| slot);
    info!(ip = ?slot.as_ref().map(SessionSlot::ip), "Live WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_live_socket(socket, state, slot))
}

async fn handle_live_socket(socket: WebSocket, app_state: Arc<AppState>, _slot: Option<SessionSlot>) {

    let bridge = SessionBridge::new(app_state.bridge.clone());
    let session_id = bridge.session_id().to_string();
    info!(session_id = %session_id, "Live WebSocket connection established");

    let (mut sender, receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<LiveMessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let writer_session = session_id.clone();
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                LiveMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!(session_id = %writer_session, "Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                LiveMessageRoute::Close => {
                    debug!(session_id = %writer_session, "Closing live WebSocket connection");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                warn!(session_id = %writer_session, "Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let outcome = bridge.run(client_frames(receiver), message_tx).await;
    match outcome {
        Ok(exit) if exit.is_error() => {
            warn!(session_id = %session_id, exit = %exit, "Live session ended with error")
        }
        Ok(exit) => info!(session_id = %session_id, exit = %exit, "Live session ended"),
        Err(e) => warn!(session_id = %session_id, "Live session handshake failed: {}", e),
    }

    if timeout(WRITER_DRAIN_TIMEOUT, &mut sender_task).await.is_err() {
        sender_task.abort();
    }

    info!(session_id = %session_id, "Live WebSocket connection terminated");
}

/// Map socket messages to client frames.
///
/// Ping and pong are handled by the transport. A socket error ends the
/// stream the same way a close frame does.
fn client_frames<S>(receiver: S) -> ClientStream
where
    S: Stream<Item = Result<Message, axum::Error>> + Send + 'static,
{
    Box::pin(receiver.filter_map(|msg| async move {
        match msg {
            Ok(Message::Text(text)) => Some(ClientFrame::Text(text.as_str().to_owned())),
            Ok(Message::Binary(data)) => Some(ClientFrame::Binary(data)),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Ok(Message::Close(_)) => Some(ClientFrame::Close),
            Err(e) => {
                warn!("Live WebSocket error: {}", e);
                Some(ClientFrame::Close)
            }
        }
    }))
}
