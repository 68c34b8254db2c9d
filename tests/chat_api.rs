use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use pest_desk::auth::ClientKeys;
use pest_desk::clock::ManualClock;
use pest_desk::errors::ProviderError;
use pest_desk::fallback::{FallbackResponder, NOTE_LOCAL, NOTE_SAFETY};
use pest_desk::models::ProviderRequest;
use pest_desk::providers::{ChatProvider, ProviderPool};
use pest_desk::rate_limit::{RateLimitConfig, RateLimiter};
use pest_desk::router;
use pest_desk::state::AppState;
use pest_desk::store::MemoryStore;

#[derive(Clone, Copy)]
enum Behavior {
    Answer,
    Down,
    Unconfigured,
}

struct FakeProvider {
    name: &'static str,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatProvider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_configured(&self) -> bool {
        !matches!(self.behavior, Behavior::Unconfigured)
    }

    async fn complete(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Answer => Ok(format!("{} says: {}", self.name, request.message.text())),
            Behavior::Down => Err(ProviderError::Connection("connection refused".into())),
            Behavior::Unconfigured => Err(ProviderError::NotConfigured(self.name)),
        }
    }

    async fn probe(&self) -> bool {
        matches!(self.behavior, Behavior::Answer)
    }
}

struct TestApp {
    router: Router,
    clock: ManualClock,
    provider: Arc<FakeProvider>,
}

fn test_app(behavior: Behavior, per_minute: u32, per_day: u32) -> TestApp {
    let clock = ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 20, 9, 0, 0)
            .unwrap()
            .timestamp_millis(),
    );
    let limiter = RateLimiter::with_clock(
        Arc::new(MemoryStore::new(100)),
        Arc::new(RateLimitConfig {
            per_minute,
            per_day,
        }),
        Arc::new(clock.clone()),
    );

    let provider = FakeProvider::new("openrouter", behavior);
    let providers: Vec<Arc<dyn ChatProvider>> = vec![
        Arc::clone(&provider) as Arc<dyn ChatProvider>,
        FakeProvider::new("gemini", Behavior::Unconfigured) as Arc<dyn ChatProvider>,
    ];
    let state = AppState::start(
        limiter,
        FallbackResponder::default(),
        ClientKeys::new(["alice-token", "bob-token"]),
        Arc::new(ProviderPool::new(providers)),
        8,
    );

    TestApp {
        router: router(state),
        clock,
        provider,
    }
}

fn chat_request(body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_live_answer() {
    // Given
    let app = test_app(Behavior::Answer, 5, 20);

    // When
    let res = app
        .router
        .oneshot(chat_request(json!({"message": "Ants in my pantry"}), None))
        .await
        .unwrap();

    // Then
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        body_json(res).await,
        json!({"response": "openrouter says: Ants in my pantry", "isFallback": false})
    );
}

#[tokio::test]
async fn test_fallback_when_provider_down() {
    let app = test_app(Behavior::Down, 5, 20);

    let res = app
        .router
        .oneshot(chat_request(
            json!({"message": "I have rats in my kitchen", "liveOnly": false}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["isFallback"], true);
    assert_eq!(body["note"], NOTE_LOCAL);
    assert!(body["response"].as_str().unwrap().contains("rodents"));
}

#[tokio::test]
async fn test_fallback_safety_note() {
    let app = test_app(Behavior::Unconfigured, 5, 20);

    let res = app
        .router
        .oneshot(chat_request(
            json!({"message": "is it safe to mix bleach and ammonia", "liveOnly": false}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["isFallback"], true);
    assert_eq!(body["note"], NOTE_SAFETY);
    // Unconfigured providers are never called
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_live_only_failure_is_bad_gateway() {
    let app = test_app(Behavior::Down, 5, 20);

    // liveOnly defaults to true
    let res = app
        .router
        .oneshot(chat_request(json!({"message": "I have rats in my kitchen"}), None))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(res).await;
    assert_eq!(
        body["message"],
        "AI Service is currently unavailable. Please check API Key."
    );
    assert!(body["details"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_per_minute_limit() {
    let app = test_app(Behavior::Answer, 1, 20);
    let body = json!({"message": "Mosquitoes in the garden"});

    let first = app
        .router
        .clone()
        .oneshot(chat_request(body.clone(), None))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    app.clock.advance_ms(15_000);
    let second = app
        .router
        .clone()
        .oneshot(chat_request(body.clone(), None))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()[header::RETRY_AFTER], "45");
    let json = body_json(second).await;
    assert_eq!(json["reason"], "per_minute_quota_exceeded");
    assert_eq!(json["retryAfterSeconds"], 45);

    // The rejected call never reached the provider
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 1);

    app.clock.advance_ms(45_000);
    let third = app
        .router
        .oneshot(chat_request(body, None))
        .await
        .unwrap();
    assert_eq!(third.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_daily_limit() {
    let app = test_app(Behavior::Answer, 10, 2);
    let body = json!({"message": "Flies near the bins"});

    for _ in 0..2 {
        let res = app
            .router
            .clone()
            .oneshot(chat_request(body.clone(), None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app
        .router
        .clone()
        .oneshot(chat_request(body, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(res).await;
    assert_eq!(json["reason"], "daily_quota_exceeded");
    // 09:00 to midnight
    assert_eq!(json["retryAfterSeconds"], 15 * 3600);
}

#[tokio::test]
async fn test_keys_are_per_credential() {
    let app = test_app(Behavior::Answer, 1, 20);
    let body = json!({"message": "Bed bugs in the guest room"});

    for token in ["alice-token", "bob-token"] {
        let res = app
            .router
            .clone()
            .oneshot(chat_request(body.clone(), Some(token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app
        .router
        .oneshot(chat_request(body, Some("alice-token")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_unknown_tokens_share_one_bucket() {
    let app = test_app(Behavior::Answer, 1, 20);
    let body = json!({"message": "Bed bugs in the guest room"});

    let first = app
        .router
        .clone()
        .oneshot(chat_request(body.clone(), Some("rand-0")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // Fresh made-up tokens and anonymous calls all land on the shared key
    for i in 1..20 {
        let token = format!("rand-{i}");
        let res = app
            .router
            .clone()
            .oneshot(chat_request(body.clone(), Some(token.as_str())))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS, "token {token}");
    }
    let res = app
        .router
        .clone()
        .oneshot(chat_request(body.clone(), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 1);

    // A known client still has its own quota
    let res = app
        .router
        .oneshot(chat_request(body, Some("alice-token")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bad_requests() {
    let app = test_app(Behavior::Answer, 5, 20);

    let res = app
        .router
        .clone()
        .oneshot(chat_request(json!({"message": "   "}), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["field"], "message");

    let res = app
        .router
        .clone()
        .oneshot(chat_request(json!({"history": []}), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Bad requests don't consume quota
    let res = app.router.oneshot(get("/api/quota")).await.unwrap();
    assert_eq!(body_json(res).await["dayRemaining"], 20);
}

#[tokio::test]
async fn test_quota_endpoint() {
    let app = test_app(Behavior::Answer, 3, 20);

    let res = app.router.clone().oneshot(get("/api/quota")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        body_json(res).await,
        json!({
            "perMinuteLimit": 3,
            "perDayLimit": 20,
            "dayRemaining": 20,
            "minuteRemaining": 3
        })
    );

    app.router
        .clone()
        .oneshot(chat_request(json!({"message": "Cockroaches at night"}), None))
        .await
        .unwrap();

    let res = app.router.oneshot(get("/api/quota")).await.unwrap();
    let json = body_json(res).await;
    assert_eq!(json["dayRemaining"], 19);
    assert_eq!(json["minuteRemaining"], 2);
    assert_eq!(json["dayResetInSeconds"], 15 * 3600);
}

#[tokio::test]
async fn test_status_endpoint() {
    let app = test_app(Behavior::Answer, 5, 20);
    let res = app.router.oneshot(get("/api/status")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({"gemini": false, "live": true}));

    let app = test_app(Behavior::Unconfigured, 5, 20);
    let res = app.router.oneshot(get("/api/status")).await.unwrap();
    assert_eq!(body_json(res).await, json!({"gemini": false, "live": false}));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = test_app(Behavior::Answer, 5, 20);

    let res = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "healthy");

    app.router
        .clone()
        .oneshot(chat_request(json!({"message": "Fleas on the cat again"}), None))
        .await
        .unwrap();

    let res = app.router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("pest_desk_chat_requests_total"));
}
