//! Pest-control advisory chat gateway.
//!
//! Forwards chat questions to a hosted model (OpenRouter or Gemini) behind a
//! per-key rate limiter, and answers from a local keyword-matched responder
//! when no model is reachable.

pub mod auth;
pub mod clock;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod worker;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/chat", post(handlers::chat_handler))
        .route("/api/status", get(handlers::status_handler))
        .route("/api/quota", get(handlers::quota_handler))
        .with_state(state)
}
