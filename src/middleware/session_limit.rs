//! Live session admission.
//!
//! Every `/live` upgrade reserves a session slot before the handler runs.
//! The slot rides in the request extensions as a [`SessionSlot`] and is
//! handed back to [`AppState`] when its last clone drops: after the socket
//! task ends, or straight away when the request never becomes a WebSocket
//! (a rejected upgrade, a failed handshake).

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::state::{AppState, ConnectionLimitError};

/// A reserved live session slot for one client address.
#[derive(Clone, Debug)]
pub struct SessionSlot(Arc<Reservation>);

#[derive(Debug)]
struct Reservation {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl SessionSlot {
    pub fn reserve(state: Arc<AppState>, ip: IpAddr) -> Result<Self, ConnectionLimitError> {
        state.try_acquire_connection(ip)?;
        Ok(Self(Arc::new(Reservation { state, ip })))
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
        debug!(
            ip = %self.ip,
            active_sessions = self.state.ws_connection_count(),
            "Live session slot released"
        );
    }
}

impl IntoResponse for ConnectionLimitError {
    fn into_response(self) -> Response {
        let (status, scope, message) = match self {
            ConnectionLimitError::GlobalLimitReached => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server",
                "The bridge is running its maximum number of live sessions",
            ),
            ConnectionLimitError::PerIpLimitReached => (
                StatusCode::TOO_MANY_REQUESTS,
                "client",
                "Too many live sessions open from this address",
            ),
        };
        (status, Json(json!({"error": message, "limit": scope}))).into_response()
    }
}

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Admit a live session upgrade or refuse it with 503 (server full) or
/// 429 (address full). Plain HTTP requests pass untouched.
pub async fn session_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    let ip = addr.ip();
    match SessionSlot::reserve(state.clone(), ip) {
        Ok(slot) => {
            request.extensions_mut().insert(slot);
            next.run(request).await
        }
        Err(refusal) => {
            warn!(
                ip = %ip,
                active_sessions = state.ws_connection_count(),
                sessions_from_ip = state.ip_connection_count(&ip),
                reason = ?refusal,
                "Refusing live session"
            );
            refusal.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DEFAULT_EXCHANGE_RATE_URL, DEFAULT_GEMINI_API_BASE_URL, DEFAULT_LIVE_MODEL,
        DEFAULT_LIVE_URL, DEFAULT_TRANSCRIPTION_MODEL, ServerConfig,
    };
    use axum::{Extension, Router, middleware, routing::get};
    use std::net::Ipv4Addr;
    use tower::ServiceExt;

    fn config(max_websocket_connections: Option<usize>, max_connections_per_ip: u32) -> ServerConfig {
        ServerConfig {
            host: "localhost".to_string(),
            port: 3001,
            tls: None,
            google_api_key: Some("test-key".to_string()),
            live_model: DEFAULT_LIVE_MODEL.to_string(),
            live_ws_url: DEFAULT_LIVE_URL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            gemini_api_base_url: DEFAULT_GEMINI_API_BASE_URL.to_string(),
            exchange_rate_url: DEFAULT_EXCHANGE_RATE_URL.to_string(),
            tool_timeout_seconds: 30,
            notes_path: None,
            render_markdown: true,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections,
            max_connections_per_ip,
        }
    }

    const CLIENT: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)), 40000);

    /// `/live` stand-in that sees the slot but never upgrades.
    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route(
                "/live",
                get(|slot: Option<Extension<SessionSlot>>| async move {
                    match slot {
                        Some(Extension(slot)) => slot.ip().to_string(),
                        None => "no slot".to_string(),
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(
                state.clone(),
                session_limit_middleware,
            ))
            .with_state(state)
    }

    fn request(upgrade: bool) -> Request<Body> {
        let mut builder = Request::builder().uri("/live");
        if upgrade {
            builder = builder
                .header(header::CONNECTION, "upgrade")
                .header(header::UPGRADE, "websocket");
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request.extensions_mut().insert(ConnectInfo(CLIENT));
        request
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_plain_request_reserves_nothing() {
        let state = AppState::new(config(Some(1), 1)).await.unwrap();
        let response = app(state.clone()).oneshot(request(false)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "no slot");
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_slot_released_when_upgrade_never_happens() {
        let state = AppState::new(config(Some(1), 1)).await.unwrap();
        let response = app(state.clone()).oneshot(request(true)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "10.1.2.3");
        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&CLIENT.ip()), 0);
    }

    #[tokio::test]
    async fn test_busy_address_is_refused() {
        let state = AppState::new(config(None, 1)).await.unwrap();
        let held = SessionSlot::reserve(state.clone(), CLIENT.ip()).unwrap();

        let response = app(state.clone()).oneshot(request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(body_text(response).await.contains("\"limit\":\"client\""));
        assert_eq!(state.ws_connection_count(), 1);

        drop(held);
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_full_server_is_refused() {
        let state = AppState::new(config(Some(1), 10)).await.unwrap();
        let other: IpAddr = Ipv4Addr::new(10, 9, 9, 9).into();
        let _held = SessionSlot::reserve(state.clone(), other).unwrap();

        let response = app(state.clone()).oneshot(request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_text(response).await.contains("\"limit\":\"server\""));
        assert_eq!(state.ip_connection_count(&CLIENT.ip()), 0);
    }

    #[tokio::test]
    async fn test_slot_outlives_request_while_cloned() {
        let state = AppState::new(config(None, 2)).await.unwrap();
        let slot = SessionSlot::reserve(state.clone(), CLIENT.ip()).unwrap();
        let socket_copy = slot.clone();

        drop(slot);
        assert_eq!(state.ip_connection_count(&CLIENT.ip()), 1);
        drop(socket_copy);
        assert_eq!(state.ip_connection_count(&CLIENT.ip()), 0);
    }
}
