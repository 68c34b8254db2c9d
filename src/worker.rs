use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::metrics::TRACKED_KEYS;
use crate::models::ChatJob;
use crate::providers::ProviderPool;
use crate::store::{MemoryStore, RateLimitStore};

// Drains the chat queue, one upstream call at a time
pub async fn dispatch_worker(mut rx: mpsc::Receiver<ChatJob>, pool: Arc<ProviderPool>) {
    info!("dispatch worker started - processing chat requests sequentially");

    while let Some(job) = rx.recv().await {
        let started = Instant::now();
        let result = pool.complete(&job.request).await;

        match &result {
            Ok(completion) => debug!(
                provider = completion.provider,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "completion received"
            ),
            Err(err) => warn!(error = %err, "no provider produced a completion"),
        }

        // Handler may have gone away (client disconnected)
        if job.reply_tx.send(result).is_err() {
            debug!("chat job abandoned before reply");
        }
    }

    info!("dispatch worker stopped - queue closed");
}

// Periodically evicts idle rate-limit entries
pub async fn store_sweeper(store: Arc<MemoryStore>, clock: Arc<dyn Clock>, every: Duration) {
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        store.sweep(clock.now_ms());
        TRACKED_KEYS.set(store.len() as i64);
    }
}
