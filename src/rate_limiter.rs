//! In-process token-bucket rate limiter.
//!
//! Buckets live in this process only. Under scale-out every instance
//! enforces its own limit, so the effective global limit is approximate.
//!
//! Refill is computed lazily from elapsed wall-clock time on each access:
//! whole intervals only, and `last_refill` advances by `intervals * T` rather
//! than jumping to `now`, so partial intervals are never lost.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{add_saturating, to_chrono, to_std, Clock};
use crate::config::RateLimitConfig;

/// Admission decision for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Tokens left after this call.
    pub remaining: u64,
    /// When the next refill interval completes.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Time until the next refill, zero if already due.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Duration {
        to_std(self.reset_at - now)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: u64,
    last_refill: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

#[derive(Default)]
struct Buckets {
    map: HashMap<String, Bucket>,
    /// When the map was last swept; sweeps are at most one refill interval
    /// apart so a map full of active keys is not rescanned on every call.
    last_sweep: Option<DateTime<Utc>>,
}

impl Buckets {
    fn sweep(&mut self, now: DateTime<Utc>, idle_ttl: Duration) -> usize {
        self.last_sweep = Some(now);
        let ttl = to_chrono(idle_ttl);
        let before = self.map.len();
        self.map.retain(|_, b| now - b.last_seen < ttl);
        let removed = before - self.map.len();
        if removed > 0 {
            debug!(removed, remaining = self.map.len(), "swept idle rate-limit buckets");
        }
        removed
    }

    fn sweep_due(&self, now: DateTime<Utc>, spacing: Duration) -> bool {
        self.last_sweep
            .map_or(true, |at| now - at >= to_chrono(spacing))
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            buckets: Mutex::new(Buckets::default()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Report the bucket state for `key` without taking a token.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock();
        let bucket = self.bucket_mut(&mut buckets.map, key, now);
        RateLimitDecision {
            allowed: bucket.tokens > 0,
            remaining: bucket.tokens,
            reset_at: add_saturating(bucket.last_refill, self.config.refill_interval),
        }
    }

    /// Take one token for `key` if available.
    pub fn consume(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock();

        if buckets.map.len() > self.config.sweep_threshold
            && buckets.sweep_due(now, self.config.refill_interval)
        {
            buckets.sweep(now, self.config.idle_ttl);
        }

        let bucket = self.bucket_mut(&mut buckets.map, key, now);
        let reset_at = add_saturating(bucket.last_refill, self.config.refill_interval);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            RateLimitDecision {
                allowed: true,
                remaining: bucket.tokens,
                reset_at,
            }
        } else {
            debug!(key, %reset_at, "rate limit exhausted");
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            }
        }
    }

    /// Evict buckets untouched for at least `idle_ttl`. Returns how many
    /// were removed.
    ///
    /// A re-created bucket starts full, so eviction is lossless whenever
    /// `idle_ttl` covers a full refill.
    pub fn sweep_idle(&self) -> usize {
        let now = self.clock.now();
        self.buckets.lock().sweep(now, self.config.idle_ttl)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.buckets.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch (or lazily create) the bucket for `key` and apply refill.
    fn bucket_mut<'a>(
        &self,
        buckets: &'a mut HashMap<String, Bucket>,
        key: &str,
        now: DateTime<Utc>,
    ) -> &'a mut Bucket {
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.config.capacity,
            last_refill: now,
            last_seen: now,
        });

        let interval_ms = to_chrono(self.config.refill_interval)
            .num_milliseconds()
            .max(1);
        let elapsed_ms = (now - bucket.last_refill).num_milliseconds();
        if elapsed_ms > 0 {
            let intervals = elapsed_ms / interval_ms;
            if intervals > 0 {
                let added = (intervals as u64).saturating_mul(self.config.refill_amount);
                bucket.tokens = bucket
                    .tokens
                    .saturating_add(added)
                    .min(self.config.capacity);
                bucket.last_refill += chrono::Duration::milliseconds(intervals * interval_ms);
            }
        }
        bucket.last_seen = now;
        bucket
    }
}
