//! Hosted model providers and the pool that fails over between them.

mod gemini;
mod openrouter;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{info, warn};

pub use gemini::GeminiProvider;
pub use openrouter::OpenRouterProvider;

use crate::errors::ProviderError;
use crate::metrics::PROVIDER_FAILURES;
use crate::models::{Completion, ProviderRequest};

pub const SYSTEM_PROMPT: &str = "You are the Professional Pest Control Intelligence Assistant (2026 Edition). \
Developed by Osteen. You are based in Nairobi, Kenya. \
Provide warm, empathetic, and expert advice on pest control. \
Use Markdown tables for comparisons. Use LaTeX for chemical formulas if mentioned.";

pub const TEMPERATURE: f32 = 0.7;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    // False when the provider has no credentials; it is then never called
    fn is_configured(&self) -> bool;

    async fn complete(&self, request: &ProviderRequest) -> Result<String, ProviderError>;

    /// Cheap reachability check used by the health checker.
    async fn probe(&self) -> bool;
}

// A provider plus its last known health
pub struct ProviderSlot {
    pub provider: Arc<dyn ChatProvider>,
    healthy: AtomicBool,
}

impl ProviderSlot {
    fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            healthy: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_configured() && self.is_healthy()
    }
}

/// Ordered providers; earlier ones are preferred.
pub struct ProviderPool {
    slots: Vec<Arc<ProviderSlot>>,
}

impl ProviderPool {
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>) -> Self {
        let slots: Vec<Arc<ProviderSlot>> = providers
            .into_iter()
            .map(|p| Arc::new(ProviderSlot::new(p)))
            .collect();

        for (i, slot) in slots.iter().enumerate() {
            info!(
                priority = i + 1,
                provider = slot.name(),
                configured = slot.provider.is_configured(),
                "provider registered"
            );
        }
        if !slots.iter().any(|s| s.provider.is_configured()) {
            warn!("no provider has an API key; every chat will use the local fallback or fail");
        }

        Self { slots }
    }

    pub fn slots(&self) -> &[Arc<ProviderSlot>] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&Arc<ProviderSlot>> {
        self.slots.iter().find(|s| s.name() == name)
    }

    // Any provider ready to take a request
    pub fn is_live(&self) -> bool {
        self.slots.iter().any(|s| s.is_available())
    }

    /// Ask each available provider in order until one answers.
    ///
    /// A provider that fails with an outage-type error is marked unhealthy
    /// until the health checker sees it recover.
    pub async fn complete(&self, request: &ProviderRequest) -> Result<Completion, ProviderError> {
        let mut last_err = None;

        for slot in self.slots.iter().filter(|s| s.is_available()) {
            match slot.provider.complete(request).await {
                Ok(text) => {
                    return Ok(Completion {
                        provider: slot.name(),
                        text,
                    });
                }
                Err(err) => {
                    PROVIDER_FAILURES.with_label_values(&[slot.name()]).inc();
                    if err.is_outage() {
                        slot.set_healthy(false);
                        warn!(provider = slot.name(), error = %err, "provider failed, marked unhealthy");
                    } else {
                        warn!(provider = slot.name(), error = %err, "provider request failed");
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| self.unavailable()))
    }

    fn unavailable(&self) -> ProviderError {
        if self.slots.iter().any(|s| s.provider.is_configured()) {
            return ProviderError::NoHealthyProviders;
        }
        match self.slots.first() {
            Some(slot) => ProviderError::NotConfigured(slot.name()),
            None => ProviderError::NoHealthyProviders,
        }
    }
}

// Health check loop - runs every `check_interval`
pub async fn health_checker(pool: Arc<ProviderPool>, check_interval: Duration) {
    let mut interval = interval(check_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval = ?check_interval, "provider health checker started");

    loop {
        interval.tick().await;

        for slot in pool.slots().iter().filter(|s| s.provider.is_configured()) {
            let was_healthy = slot.is_healthy();
            let is_healthy = slot.provider.probe().await;
            slot.set_healthy(is_healthy);

            if was_healthy != is_healthy {
                if is_healthy {
                    info!(provider = slot.name(), "provider is now healthy");
                } else {
                    warn!(provider = slot.name(), "provider is now unhealthy");
                }
            }
        }
    }
}
