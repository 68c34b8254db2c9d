use lazy_static::lazy_static;
use prometheus::{
    Counter, Histogram, IntCounterVec, IntGauge, register_counter, register_histogram,
    register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("pest_desk_chat_requests_total", "Total number of chat requests").unwrap();
    pub static ref FALLBACK_TOTAL: Counter = register_counter!(
        "pest_desk_fallback_responses_total",
        "Chat requests answered by the local fallback"
    )
    .unwrap();
    pub static ref RATE_LIMITED: IntCounterVec = register_int_counter_vec!(
        "pest_desk_rate_limited_total",
        "Chat requests rejected by the rate limiter",
        &["reason"]
    )
    .unwrap();
    pub static ref PROVIDER_FAILURES: IntCounterVec = register_int_counter_vec!(
        "pest_desk_provider_failures_total",
        "Failed calls to a hosted model",
        &["provider"]
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "pest_desk_chat_latency_seconds",
        "Chat request latency in seconds"
    )
    .unwrap();
    pub static ref TRACKED_KEYS: IntGauge = register_int_gauge!(
        "pest_desk_rate_limit_keys",
        "Keys currently held by the rate limiter"
    )
    .unwrap();
}
