use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::time::Duration;
use tracing::info;

use pest_desk::auth::ClientKeys;
use pest_desk::clock::{Clock, SystemClock};
use pest_desk::config::{Args, EnvLimits};
use pest_desk::fallback::FallbackResponder;
use pest_desk::providers::{
    ChatProvider, GeminiProvider, OpenRouterProvider, ProviderPool, health_checker,
};
use pest_desk::rate_limit::{LimitSource, RateLimiter};
use pest_desk::state::AppState;
use pest_desk::store::MemoryStore;
use pest_desk::worker::store_sweeper;
use pest_desk::{logging, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    logging::init(env!("CARGO_PKG_NAME"), args.log_json);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.request_timeout))
        .build()
        .context("failed to build HTTP client")?;

    let openrouter = OpenRouterProvider::new(
        client.clone(),
        args.openrouter_api_key(),
        &args.openrouter_url,
        &args.openrouter_model,
    )
    .with_attribution(&args.referer, &args.title);
    let gemini = GeminiProvider::new(
        client,
        args.gemini_api_key(),
        &args.gemini_url,
        &args.gemini_model,
    );
    let providers: Vec<Arc<dyn ChatProvider>> = vec![Arc::new(openrouter), Arc::new(gemini)];
    let pool = Arc::new(ProviderPool::new(providers));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new(args.max_keys));
    let limits = EnvLimits::new(args.startup_limits());
    let effective = limits.limits();
    let limiter = RateLimiter::with_clock(Arc::clone(&store), Arc::new(limits), Arc::clone(&clock));
    let clients = ClientKeys::new(&args.client_keys);

    tokio::spawn(health_checker(
        Arc::clone(&pool),
        Duration::from_secs(args.health_interval),
    ));
    tokio::spawn(store_sweeper(
        store,
        clock,
        Duration::from_secs(args.sweep_interval),
    ));

    let state = AppState::start(
        limiter,
        FallbackResponder::new(args.safety_order()),
        clients.clone(),
        pool,
        args.queue_size,
    );
    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "pest-desk listening");
    info!(
        per_minute = effective.per_minute,
        per_day = effective.per_day,
        known_clients = clients.len(),
        safety_first = args.safety_first,
        "free tier limits (overridable via FREE_TIER_PER_MINUTE / FREE_TIER_PER_DAY)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("pest-desk stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
