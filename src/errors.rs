use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::rate_limit::RejectReason;

/// Failures talking to a hosted model.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    /// The provider has no API key.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    /// No configured provider is currently marked healthy.
    #[error("no healthy providers available")]
    NoHealthyProviders,
    #[error("connection error: {0}")]
    Connection(String),
    /// The provider answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    /// A 2xx answer with no usable text in it.
    #[error("empty completion")]
    Empty,
}

impl ProviderError {
    // Failures that say something about the provider's availability
    pub fn is_outage(&self) -> bool {
        match self {
            ProviderError::Connection(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    // Short description safe to hand back to clients
    pub fn details(&self) -> String {
        match self {
            ProviderError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors surfaced by the HTTP handlers.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        field: Option<&'static str>,
    },
    #[error("rate limited ({reason}), retry after {retry_after_secs}s")]
    RateLimited {
        reason: RejectReason,
        retry_after_secs: u64,
    },
    #[error("upstream unavailable: {0}")]
    Upstream(ProviderError),
    #[error("internal error: {0}")]
    Internal(String),
}

fn wait_message(reason: RejectReason, secs: u64) -> String {
    match reason {
        RejectReason::DailyQuotaExceeded => format!(
            "Daily free-tier limit reached. Please try again in {} hour(s).",
            secs.div_ceil(3600)
        ),
        RejectReason::PerMinuteQuotaExceeded => {
            format!("Too many requests. Please wait {secs} second(s) before trying again.")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest { message, field } => {
                let body = match field {
                    Some(field) => json!({ "message": message, "field": field }),
                    None => json!({ "message": message }),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::RateLimited {
                reason,
                retry_after_secs,
            } => {
                let body = json!({
                    "message": wait_message(reason, retry_after_secs),
                    "reason": reason,
                    "retryAfterSeconds": retry_after_secs,
                });
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            ApiError::Upstream(err) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "message": "AI Service is currently unavailable. Please check API Key.",
                    "details": err.details(),
                })),
            )
                .into_response(),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Internal Server Error" })),
            )
                .into_response(),
        }
    }
}
