//! Session bridge lifecycle.
//!
//! ```text
//! INIT -> HANDSHAKE -> ACTIVE -> CLOSING -> CLOSED
//!   \________\_________________________/^
//! ```
//!
//! `INIT` waits for the client's first frame, `HANDSHAKE` opens the upstream
//! session with the client's setup, `ACTIVE` runs both pumps. The first pump
//! to finish moves the session to `CLOSING`: the sibling is cancelled and
//! awaited (aborted after a grace period), the upstream handle is released
//! and the client writer is told to close. Handshake failures go straight to
//! `CLOSED`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::egress::EgressPump;
use super::ingress::IngressPump;
use super::messages::{ClientEnvelope, ClientFrame, LiveMessageRoute};
use crate::core::live::{LiveConnector, LiveError, LiveSession, LiveSetup};
use crate::core::render::MarkupRenderer;
use crate::core::tools::ToolDispatcher;
use crate::core::transcribe::Transcriber;

/// How long a new connection may take to send its setup frame.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the surviving pump gets to finish after its sibling stopped.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Handshake,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Init => "init",
            SessionState::Handshake => "handshake",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpExit {
    /// The client closed its transport
    ClientClosed,
    /// The client writer is gone, nothing more can be delivered
    ClientGone,
    /// The upstream session ended cleanly
    UpstreamClosed,
    /// Reading from the upstream session failed
    UpstreamError(String),
    /// Stopped by the bridge or by server shutdown
    Cancelled,
    /// The pump task itself failed
    Aborted(String),
}

impl PumpExit {
    pub fn is_error(&self) -> bool {
        matches!(self, PumpExit::UpstreamError(_) | PumpExit::Aborted(_))
    }
}

impl fmt::Display for PumpExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpExit::ClientClosed => write!(f, "client closed"),
            PumpExit::ClientGone => write!(f, "client writer gone"),
            PumpExit::UpstreamClosed => write!(f, "upstream closed"),
            PumpExit::UpstreamError(e) => write!(f, "upstream error: {e}"),
            PumpExit::Cancelled => write!(f, "cancelled"),
            PumpExit::Aborted(e) => write!(f, "aborted: {e}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("client closed before sending setup")]
    ClientClosed,

    #[error("no setup received within {0}s")]
    Timeout(u64),

    #[error("invalid setup frame: {0}")]
    InvalidFrame(String),

    #[error("first message must contain a setup object")]
    MissingSetup,

    #[error("failed to open live session: {0}")]
    Upstream(#[from] LiveError),

    #[error("session cancelled during handshake")]
    Cancelled,
}

/// Shared, read-only collaborators for every session on this server.
#[derive(Clone)]
pub struct BridgeContext {
    pub connector: Arc<dyn LiveConnector>,
    pub dispatcher: Arc<ToolDispatcher>,
    pub transcriber: Arc<dyn Transcriber>,
    pub renderer: Arc<dyn MarkupRenderer>,
    /// Live model id; always overrides any model in the client setup
    pub model: String,
    pub setup_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl BridgeContext {
    pub fn new(
        connector: Arc<dyn LiveConnector>,
        dispatcher: Arc<ToolDispatcher>,
        transcriber: Arc<dyn Transcriber>,
        renderer: Arc<dyn MarkupRenderer>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            dispatcher,
            transcriber,
            renderer,
            model: model.into(),
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

impl fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeContext")
            .field("provider", &self.connector.provider_name())
            .field("model", &self.model)
            .field("tools", self.dispatcher.registry())
            .field("setup_timeout", &self.setup_timeout)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

/// One client connection bridged to one live session.
pub struct SessionBridge {
    session_id: String,
    ctx: BridgeContext,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
}

impl SessionBridge {
    pub fn new(ctx: BridgeContext) -> Self {
        let (state, _) = watch::channel(SessionState::Init);
        Self {
            session_id: Uuid::new_v4().to_string(),
            ctx,
            state,
            cancel: CancellationToken::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Cancelling this token closes the session from outside.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn transition(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(session_id = %self.session_id, from = %previous, to = %next, "Session state changed");
        }
    }

    /// Drive the session to completion.
    ///
    /// `inbound` yields client frames; `outbound` feeds the connection's
    /// writer task and receives [`LiveMessageRoute::Close`] at the end.
    pub async fn run<S>(
        self,
        mut inbound: S,
        outbound: mpsc::Sender<LiveMessageRoute>,
    ) -> Result<PumpExit, HandshakeError>
    where
        S: Stream<Item = ClientFrame> + Send + Unpin + 'static,
    {
        let session = match self.handshake(&mut inbound).await {
            Ok(session) => session,
            Err(e) => {
                warn!(session_id = %self.session_id, "Handshake failed: {}", e);
                self.transition(SessionState::Closed);
                let _ = outbound.send(LiveMessageRoute::Close).await;
                return Err(e);
            }
        };

        self.transition(SessionState::Active);
        info!(
            session_id = %self.session_id,
            provider = self.ctx.connector.provider_name(),
            model = %self.ctx.model,
            "Live session active"
        );

        let upstream = session.sender;
        let pumps = self.cancel.child_token();

        let ingress = IngressPump::new(
            self.session_id.clone(),
            upstream.clone(),
            self.ctx.transcriber.clone(),
            outbound.clone(),
            pumps.clone(),
        );
        let egress = EgressPump::new(
            self.session_id.clone(),
            upstream.clone(),
            session.receiver,
            self.ctx.dispatcher.clone(),
            self.ctx.renderer.clone(),
            outbound.clone(),
            pumps.clone(),
        );

        let mut ingress_task = tokio::spawn(ingress.run(inbound));
        let mut egress_task = tokio::spawn(egress.run());

        let (exit, sibling, sibling_name) = tokio::select! {
            result = &mut ingress_task => (join_exit(result), egress_task, "egress"),
            result = &mut egress_task => (join_exit(result), ingress_task, "ingress"),
        };

        self.transition(SessionState::Closing);
        info!(session_id = %self.session_id, reason = %exit, "Session closing");

        pumps.cancel();
        self.await_sibling(sibling, sibling_name).await;

        if let Err(e) = upstream.close().await {
            warn!(session_id = %self.session_id, "Failed to close upstream session: {}", e);
        }
        let _ = outbound.send(LiveMessageRoute::Close).await;

        self.transition(SessionState::Closed);
        if exit.is_error() {
            error!(session_id = %self.session_id, reason = %exit, "Session closed with error");
        } else {
            info!(session_id = %self.session_id, reason = %exit, "Session closed");
        }
        Ok(exit)
    }

    async fn handshake<S>(&self, inbound: &mut S) -> Result<LiveSession, HandshakeError>
    where
        S: Stream<Item = ClientFrame> + Unpin,
    {
        let first = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(HandshakeError::Cancelled),
            frame = tokio::time::timeout(self.ctx.setup_timeout, inbound.next()) => frame
                .map_err(|_| HandshakeError::Timeout(self.ctx.setup_timeout.as_secs()))?,
        };

        let text = match first {
            None | Some(ClientFrame::Close) => return Err(HandshakeError::ClientClosed),
            Some(ClientFrame::Binary(_)) => {
                return Err(HandshakeError::InvalidFrame(
                    "expected a JSON text frame".to_string(),
                ));
            }
            Some(ClientFrame::Text(text)) => text,
        };

        self.transition(SessionState::Handshake);
        let config = parse_setup(&text)?;

        let setup = LiveSetup {
            model: self.ctx.model.clone(),
            config,
            tools: self.ctx.dispatcher.registry().setup_tools(),
        };
        debug!(
            session_id = %self.session_id,
            tools = self.ctx.dispatcher.registry().len(),
            "Opening live session"
        );

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HandshakeError::Cancelled),
            session = self.ctx.connector.connect(setup) => Ok(session?),
        }
    }

    async fn await_sibling(&self, mut task: JoinHandle<PumpExit>, name: &'static str) {
        match tokio::time::timeout(self.ctx.shutdown_grace, &mut task).await {
            Ok(result) => {
                let exit = join_exit(result);
                debug!(session_id = %self.session_id, pump = name, reason = %exit, "Pump stopped");
            }
            Err(_) => {
                warn!(session_id = %self.session_id, pump = name, "Pump did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

fn parse_setup(text: &str) -> Result<Value, HandshakeError> {
    let envelope: ClientEnvelope =
        serde_json::from_str(text).map_err(|e| HandshakeError::InvalidFrame(e.to_string()))?;
    match envelope.setup {
        Some(Value::Object(config)) => Ok(Value::Object(config)),
        Some(Value::Null) | None => Err(HandshakeError::MissingSetup),
        Some(_) => Err(HandshakeError::InvalidFrame(
            "setup must be a JSON object".to_string(),
        )),
    }
}

fn join_exit(result: Result<PumpExit, tokio::task::JoinError>) -> PumpExit {
    result.unwrap_or_else(|e| PumpExit::Aborted(e.to_string()))
}
