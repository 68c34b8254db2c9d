use clap::Parser;
use tracing::warn;

use crate::fallback::SafetyOrder;
use crate::rate_limit::{LimitSource, RateLimitConfig};

pub const PER_MINUTE_ENV: &str = "FREE_TIER_PER_MINUTE";
pub const PER_DAY_ENV: &str = "FREE_TIER_PER_DAY";

// Secondary name some hosting setups use for the Gemini key
const GEMINI_KEY_ALT_ENV: &str = "AI_INTEGRATIONS_GEMINI_API_KEY";

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "pest-desk")]
#[command(about = "Pest-control advisory chat gateway with a local fallback responder")]
pub struct Args {
    /// Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// OpenRouter API key; the provider is skipped when unset
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = "https://openrouter.ai/api/v1")]
    pub openrouter_url: String,

    #[arg(long, env = "OPENROUTER_MODEL", default_value = "google/gemini-2.0-flash-001")]
    pub openrouter_model: String,

    /// Gemini API key (falls back to AI_INTEGRATIONS_GEMINI_API_KEY)
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(
        long,
        env = "AI_INTEGRATIONS_GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_url: String,

    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.5-flash")]
    pub gemini_model: String,

    /// Sent as HTTP-Referer to OpenRouter
    #[arg(long, default_value = "https://pest-ai-1.onrender.com")]
    pub referer: String,

    /// Sent as X-Title to OpenRouter
    #[arg(long, default_value = "Pest AI Sales Desk")]
    pub title: String,

    /// Requests allowed per key in any 60s window; FREE_TIER_PER_MINUTE overrides it at runtime
    #[arg(long, default_value_t = 1)]
    pub per_minute: u32,

    /// Requests allowed per key per UTC day; FREE_TIER_PER_DAY overrides it at runtime
    #[arg(long, default_value_t = 20)]
    pub per_day: u32,

    /// Bearer tokens that get their own quota; any other caller shares one
    #[arg(long, env = "CLIENT_API_KEYS", value_delimiter = ',', hide_env_values = true)]
    pub client_keys: Vec<String>,

    // Upper bound on tracked rate-limit keys
    #[arg(long, default_value_t = 10_000)]
    pub max_keys: usize,

    // Seconds between rate-limit store sweeps
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Seconds between provider health checks
    #[arg(long, default_value_t = 30)]
    pub health_interval: u64,

    // Timeout for a single upstream call, in seconds
    #[arg(long, default_value_t = 60)]
    pub request_timeout: u64,

    // Pending chat jobs before senders wait
    #[arg(long, default_value_t = 100)]
    pub queue_size: usize,

    /// Check danger keywords before pest topics in the fallback responder
    #[arg(long)]
    pub safety_first: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    pub fn gemini_api_key(&self) -> Option<String> {
        self.gemini_api_key
            .clone()
            .or_else(|| std::env::var(GEMINI_KEY_ALT_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn openrouter_api_key(&self) -> Option<String> {
        self.openrouter_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn safety_order(&self) -> SafetyOrder {
        if self.safety_first {
            SafetyOrder::BeforeTopics
        } else {
            SafetyOrder::AfterTopics
        }
    }

    pub fn startup_limits(&self) -> RateLimitConfig {
        RateLimitConfig {
            per_minute: self.per_minute,
            per_day: self.per_day,
        }
    }
}

/// Limits re-read from the environment on every call.
///
/// Unset or unparsable variables fall back to the `--per-minute`/`--per-day`
/// values, at startup and at runtime alike.
#[derive(Debug, Clone)]
pub struct EnvLimits {
    defaults: RateLimitConfig,
}

impl EnvLimits {
    pub fn new(defaults: RateLimitConfig) -> Self {
        Self { defaults }
    }
}

fn env_parse(key: &str) -> Option<u32> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = %raw, %err, "ignoring invalid limit override");
            None
        }
    }
}

impl LimitSource for EnvLimits {
    fn limits(&self) -> RateLimitConfig {
        RateLimitConfig {
            per_minute: env_parse(PER_MINUTE_ENV).unwrap_or(self.defaults.per_minute),
            per_day: env_parse(PER_DAY_ENV).unwrap_or(self.defaults.per_day),
        }
    }
}
