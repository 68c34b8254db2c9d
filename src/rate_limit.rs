//! Per-key admission control over two windows: a rolling 60 second window and
//! the current UTC calendar day.
//!
//! Limits are pulled from a [`LimitSource`] on every call, so a source that
//! re-reads its configuration makes limit changes take effect without a
//! restart. Rejections are returned as values and never consume quota.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::clock::{Clock, MINUTE_MS, SystemClock, ceil_secs, next_utc_midnight_ms};
use crate::store::{MemoryStore, RateLimitEntry, RateLimitStore};

// Quota limits in effect for one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 1,
            per_day: 20,
        }
    }
}

/// Where the limiter reads its limits from.
pub trait LimitSource: Send + Sync {
    fn limits(&self) -> RateLimitConfig;
}

impl LimitSource for RateLimitConfig {
    fn limits(&self) -> RateLimitConfig {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    DailyQuotaExceeded,
    PerMinuteQuotaExceeded,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::DailyQuotaExceeded => "daily_quota_exceeded",
            RejectReason::PerMinuteQuotaExceeded => "per_minute_quota_exceeded",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Outcome of check_and_consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Rejected {
        reason: RejectReason,
        retry_after_secs: u64,
    },
}

impl Decision {
    pub fn is_ok(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Remaining capacity for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub per_minute_limit: u32,
    pub per_day_limit: u32,
    pub day_remaining: u32,
    pub minute_remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_reset_in_seconds: Option<u64>,
}

pub struct RateLimiter<S = MemoryStore> {
    store: Arc<S>,
    limits: Arc<dyn LimitSource>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for RateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            limits: Arc::clone(&self.limits),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: Arc<S>, limits: Arc<dyn LimitSource>) -> Self {
        Self::with_clock(store, limits, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, limits: Arc<dyn LimitSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            limits,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Admit one request for `key` if both windows have room.
    ///
    /// The daily window is checked before the minute window. On rejection the
    /// stored counters are left untouched, so retrying immediately yields the
    /// same answer.
    pub fn check_and_consume(&self, key: &str) -> Decision {
        let now = self.clock.now_ms();
        let limits = self.limits.limits();

        self.store.with_entry(
            key,
            now,
            || RateLimitEntry::new(next_utc_midnight_ms(now)),
            |entry| {
                if now >= entry.day_reset_at {
                    entry.day_count = 0;
                    entry.day_reset_at = next_utc_midnight_ms(now);
                }
                entry.prune_minute(now);

                if entry.day_count >= limits.per_day {
                    return Decision::Rejected {
                        reason: RejectReason::DailyQuotaExceeded,
                        retry_after_secs: ceil_secs(entry.day_reset_at - now),
                    };
                }

                if entry.minute_timestamps.len() >= limits.per_minute as usize {
                    // Zero per-minute limit leaves the window empty; wait a full minute
                    let exits_at = entry
                        .minute_timestamps
                        .front()
                        .map_or(now + MINUTE_MS, |&oldest| oldest + MINUTE_MS);
                    return Decision::Rejected {
                        reason: RejectReason::PerMinuteQuotaExceeded,
                        retry_after_secs: ceil_secs(exits_at - now),
                    };
                }

                entry.minute_timestamps.push_back(now);
                entry.day_count += 1;
                Decision::Allowed
            },
        )
    }

    /// Remaining capacity for `key` without touching its state.
    pub fn status(&self, key: &str) -> Status {
        let now = self.clock.now_ms();
        let limits = self.limits.limits();

        let Some(entry) = self.store.get(key) else {
            return Status {
                per_minute_limit: limits.per_minute,
                per_day_limit: limits.per_day,
                day_remaining: limits.per_day,
                minute_remaining: limits.per_minute,
                day_reset_in_seconds: None,
            };
        };

        // A day that already rolled over counts as unused
        let (day_count, day_reset_at) = if now >= entry.day_reset_at {
            (0, next_utc_midnight_ms(now))
        } else {
            (entry.day_count, entry.day_reset_at)
        };
        let minute_used = u32::try_from(entry.minute_used(now)).unwrap_or(u32::MAX);

        Status {
            per_minute_limit: limits.per_minute,
            per_day_limit: limits.per_day,
            day_remaining: limits.per_day.saturating_sub(day_count),
            minute_remaining: limits.per_minute.saturating_sub(minute_used),
            day_reset_in_seconds: Some(ceil_secs(day_reset_at - now)),
        }
    }
}
