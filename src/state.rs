use std::sync::Arc;

use tokio::sync::mpsc;

use crate::auth::ClientKeys;
use crate::fallback::FallbackResponder;
use crate::models::ChatJob;
use crate::providers::ProviderPool;
use crate::rate_limit::RateLimiter;
use crate::store::MemoryStore;
use crate::worker::dispatch_worker;

// app's shared state
pub struct AppState {
    pub limiter: RateLimiter<MemoryStore>,
    pub responder: FallbackResponder,
    pub clients: ClientKeys,
    pub pool: Arc<ProviderPool>,
    pub jobs_tx: mpsc::Sender<ChatJob>,
}

impl AppState {
    /// Build the shared state and spawn the dispatch worker that serves its queue.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        limiter: RateLimiter<MemoryStore>,
        responder: FallbackResponder,
        clients: ClientKeys,
        pool: Arc<ProviderPool>,
        queue_size: usize,
    ) -> Arc<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<ChatJob>(queue_size.max(1));
        tokio::spawn(dispatch_worker(jobs_rx, Arc::clone(&pool)));

        Arc::new(Self {
            limiter,
            responder,
            clients,
            pool,
            jobs_tx,
        })
    }
}
