//! Shared application state.
//!
//! Holds the server configuration, the collaborators every live session
//! shares, and the WebSocket connection counters used by the
//! connection limit middleware.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use dashmap::DashMap;

use crate::config::ServerConfig;
use crate::core::{
    BridgeContext, ExchangeRateClient, GeminiLiveConfig, GeminiTranscriber, HtmlRenderer,
    InMemoryNoteStore, MarkupRenderer, NoteStore, PlainRenderer, ToolDispatcher,
    build_default_registry, create_live_connector,
};

/// Reason a WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

pub struct AppState {
    pub config: ServerConfig,
    pub bridge: BridgeContext,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    /// Build the shared state from a validated configuration.
    ///
    /// Fails when the Gemini API key is missing or a collaborator cannot
    /// be constructed (for example an unreadable diary snapshot).
    pub async fn new(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let api_key = config.require_google_api_key()?.to_string();

        let store: Arc<dyn NoteStore> = match &config.notes_path {
            Some(path) => Arc::new(
                InMemoryNoteStore::open(path)
                    .await
                    .with_context(|| format!("Failed to open diary at {}", path.display()))?,
            ),
            None => Arc::new(InMemoryNoteStore::new()),
        };

        let exchange_rates = ExchangeRateClient::new(config.exchange_rate_url.clone())
            .context("Failed to create exchange rate client")?;
        let registry = build_default_registry(store, exchange_rates)
            .context("Failed to register tools")?;
        let dispatcher =
            Arc::new(ToolDispatcher::new(Arc::new(registry)).with_timeout(config.tool_timeout()));

        let transcriber = Arc::new(
            GeminiTranscriber::new(
                api_key.clone(),
                config.gemini_api_base_url.clone(),
                config.transcription_model.clone(),
            )
            .context("Failed to create transcriber")?,
        );

        let renderer: Arc<dyn MarkupRenderer> = if config.render_markdown {
            Arc::new(HtmlRenderer::new())
        } else {
            Arc::new(PlainRenderer)
        };

        let connector = create_live_connector(
            "gemini",
            GeminiLiveConfig::new(api_key).with_ws_url(config.live_ws_url.clone()),
        )
        .context("Failed to create live connector")?;

        let bridge = BridgeContext::new(
            connector,
            dispatcher,
            transcriber,
            renderer,
            config.live_model.clone(),
        );

        Ok(Arc::new(Self::with_bridge(config, bridge)))
    }

    /// State around an already assembled bridge context.
    pub fn with_bridge(config: ServerConfig, bridge: BridgeContext) -> Self {
        Self {
            config,
            bridge,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        }
    }

    /// Reserve a connection slot for `ip`.
    ///
    /// Every successful call must be paired with [`Self::release_connection`].
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= self.config.max_connections_per_ip {
            return Err(ConnectionLimitError::PerIpLimitReached);
        }

        if let Some(max) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < max).then_some(current + 1)
                });
            if reserved.is_err() {
                drop(per_ip);
                self.ip_connections.remove_if(&ip, |_, count| *count == 0);
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::AcqRel);
        }

        *per_ip += 1;
        Ok(())
    }

    pub fn release_connection(&self, ip: IpAddr) {
        let held = match self.ip_connections.get_mut(&ip) {
            Some(mut count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        };
        if !held {
            return;
        }

        self.ip_connections.remove_if(&ip, |_, count| *count == 0);
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("address", &self.config.address())
            .field("bridge", &self.bridge)
            .field("ws_connections", &self.ws_connection_count())
            .finish()
    }
}
