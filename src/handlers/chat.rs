use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::errors::ApiError;
use crate::metrics::{FALLBACK_TOTAL, RATE_LIMITED, REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{ChatJob, ChatRequest, ChatResponse};
use crate::rate_limit::Decision;
use crate::state::AppState;

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    REQUEST_TOTAL.inc();

    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest {
        message: rejection.body_text(),
        field: None,
    })?;
    if request.message.is_blank() {
        return Err(ApiError::BadRequest {
            message: "Message is required".to_string(),
            field: Some("message"),
        });
    }

    let key = state.clients.caller_key(&headers);
    if let Decision::Rejected {
        reason,
        retry_after_secs,
    } = state.limiter.check_and_consume(&key)
    {
        RATE_LIMITED.with_label_values(&[reason.as_str()]).inc();
        info!(%key, %reason, retry_after_secs, "chat request rate limited");
        return Err(ApiError::RateLimited {
            reason,
            retry_after_secs,
        });
    }

    let start_time = Instant::now();
    let live_only = request.live_only;
    let question = request.message.text();

    let (reply_tx, reply_rx) = oneshot::channel();
    let job = ChatJob {
        request: request.into(),
        reply_tx,
    };

    state.jobs_tx.send(job).await.map_err(|_| {
        error!("dispatch queue is closed");
        ApiError::Internal("failed to queue request".to_string())
    })?;

    let result = reply_rx.await.map_err(|_| {
        error!("dispatch worker dropped a chat job");
        ApiError::Internal("worker failed to respond".to_string())
    })?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    match result {
        Ok(completion) => Ok(Json(ChatResponse {
            response: completion.text,
            is_fallback: false,
            note: None,
        })),
        Err(err) if live_only => {
            warn!(error = %err, "live-only chat failed");
            Err(ApiError::Upstream(err))
        }
        Err(err) => {
            FALLBACK_TOTAL.inc();
            let reply = state.responder.local_reply(&question);
            info!(error = %err, note = reply.note, "answering from local fallback");
            Ok(Json(ChatResponse {
                response: reply.answer,
                is_fallback: true,
                note: Some(reply.note.to_string()),
            }))
        }
    }
}
