//! Live WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::live::live_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the live session router
///
/// # Endpoint
///
/// `GET /live` - WebSocket upgrade; the first text frame must carry `setup`
///
/// # Example
///
/// ```json
/// // Client sends setup
/// {"setup": {"generation_config": {"response_modalities": ["AUDIO"]}}}
///
/// // Server responds once Gemini accepts the session
/// {"setupComplete": "true"}
///
/// // Client streams media
/// {"realtime_input": {"media_chunks": [{"mime_type": "application/json", "data": "hello"}]}}
/// ```
pub fn create_live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/live", get(live_handler))
        .layer(TraceLayer::new_for_http())
}
