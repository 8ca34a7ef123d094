use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: &'static str,
    pub model: String,
    pub tools: Vec<String>,
    pub active_sessions: usize,
}

/// Health check handler
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        provider: state.bridge.connector.provider_name(),
        model: state.bridge.model.clone(),
        tools: state
            .bridge
            .dispatcher
            .registry()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        active_sessions: state.ws_connection_count(),
    })
}
