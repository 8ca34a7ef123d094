//! Scripted live session and transcriber stubs for bridge tests.
//!
//! The test drives the upstream side through an [`UpstreamHandle`]: it
//! pushes events the model would emit and reads what the bridge wrote.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;

use waav_live_bridge::core::live::{
    LiveConnector, LiveError, LiveEvent, LiveInput, LiveReceiver, LiveResult, LiveSender,
    LiveSession, LiveSetup,
};
use waav_live_bridge::core::transcribe::{TranscribeError, TranscribeResult, Transcriber};

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

type SessionParts = (
    mpsc::UnboundedReceiver<LiveResult<LiveEvent>>,
    mpsc::UnboundedSender<LiveInput>,
);

pub struct ScriptedConnector {
    parts: Mutex<Option<SessionParts>>,
    setups: Arc<Mutex<Vec<LiveSetup>>>,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
    refuse: bool,
}

/// Test side of a scripted session.
pub struct UpstreamHandle {
    events: Option<mpsc::UnboundedSender<LiveResult<LiveEvent>>>,
    inputs: mpsc::UnboundedReceiver<LiveInput>,
    setups: Arc<Mutex<Vec<LiveSetup>>>,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

pub fn scripted_upstream() -> (Arc<ScriptedConnector>, UpstreamHandle) {
    build(false)
}

/// A connector whose `connect` always fails.
pub fn refusing_upstream() -> (Arc<ScriptedConnector>, UpstreamHandle) {
    build(true)
}

fn build(refuse: bool) -> (Arc<ScriptedConnector>, UpstreamHandle) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
    let setups = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));
    let close_calls = Arc::new(AtomicUsize::new(0));

    let connector = Arc::new(ScriptedConnector {
        parts: Mutex::new(Some((events_rx, inputs_tx))),
        setups: setups.clone(),
        closed: closed.clone(),
        close_calls: close_calls.clone(),
        refuse,
    });
    let handle = UpstreamHandle {
        events: Some(events_tx),
        inputs: inputs_rx,
        setups,
        closed,
        close_calls,
    };
    (connector, handle)
}

#[async_trait]
impl LiveConnector for ScriptedConnector {
    async fn connect(&self, setup: LiveSetup) -> LiveResult<LiveSession> {
        self.setups.lock().push(setup);
        if self.refuse {
            return Err(LiveError::ConnectionFailed("scripted refusal".to_string()));
        }
        let (events, inputs) = self
            .parts
            .lock()
            .take()
            .ok_or_else(|| LiveError::ConnectionFailed("already connected".to_string()))?;

        Ok(LiveSession {
            sender: Arc::new(ScriptedSender {
                inputs,
                closed: self.closed.clone(),
                close_calls: self.close_calls.clone(),
            }),
            receiver: Box::new(ScriptedReceiver { events }),
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedSender {
    inputs: mpsc::UnboundedSender<LiveInput>,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LiveSender for ScriptedSender {
    async fn send(&self, input: LiveInput) -> LiveResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LiveError::NotConnected);
        }
        self.inputs
            .send(input)
            .map_err(|_| LiveError::ConnectionClosed("test dropped upstream".to_string()))
    }

    async fn close(&self) -> LiveResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedReceiver {
    events: mpsc::UnboundedReceiver<LiveResult<LiveEvent>>,
}

#[async_trait]
impl LiveReceiver for ScriptedReceiver {
    async fn next_event(&mut self) -> Option<LiveResult<LiveEvent>> {
        self.events.recv().await
    }
}

impl UpstreamHandle {
    pub fn emit(&self, event: LiveEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(Ok(event));
        }
    }

    pub fn fail(&self, error: LiveError) {
        if let Some(events) = &self.events {
            let _ = events.send(Err(error));
        }
    }

    /// End the upstream event stream, as if the provider hung up.
    pub fn hang_up(&mut self) {
        self.events = None;
    }

    /// Next input the bridge wrote upstream.
    pub async fn next_input(&mut self) -> LiveInput {
        timeout(STEP_TIMEOUT, self.inputs.recv())
            .await
            .expect("timed out waiting for upstream input")
            .expect("upstream input channel closed")
    }

    /// Whether nothing else was written upstream within `wait`.
    pub async fn is_quiet(&mut self, wait: Duration) -> bool {
        timeout(wait, self.inputs.recv()).await.is_err()
    }

    pub fn setups(&self) -> Vec<LiveSetup> {
        self.setups.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

/// Transcriber that echoes a fixed transcript and counts calls.
pub struct StubTranscriber {
    pub transcript: String,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl StubTranscriber {
    pub fn new(transcript: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            transcript: transcript.into(),
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            transcript: String::new(),
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _pcm_base64: &str) -> TranscribeResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TranscribeError::ServiceError {
                status: 500,
                message: "stub failure".to_string(),
            });
        }
        Ok(self.transcript.clone())
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}
