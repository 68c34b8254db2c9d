use std::sync::Arc;

use axum::{Json, extract::State, http::HeaderMap};
use serde::Serialize;

use crate::rate_limit::Status;
use crate::state::AppState;

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct SystemStatus {
    pub gemini: bool,
    pub live: bool,
}

// Which hosted models can currently take requests
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let gemini = state
        .pool
        .slot("gemini")
        .is_some_and(|slot| slot.is_available());

    Json(SystemStatus {
        gemini,
        live: state.pool.is_live(),
    })
}

// Remaining quota for the calling key; never consumes any
pub async fn quota_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<Status> {
    Json(state.limiter.status(&state.clients.caller_key(&headers)))
}
