//! Per-account token buckets for bet and seed endpoints

use crate::config::RateLimitConfig;
use crate::games::types::AccountId;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    Bets,
    Seeds,
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// `capacity` tokens refill evenly over `window_secs`
struct Limiter {
    capacity: f64,
    window_secs: f64,
    buckets: DashMap<AccountId, TokenBucket>,
}

impl Limiter {
    fn new(points: u32, window_secs: u64) -> Self {
        Self {
            capacity: f64::from(points.max(1)),
            window_secs: window_secs.max(1) as f64,
            buckets: DashMap::new(),
        }
    }

    /// Consume one token, or report how long until one is available
    fn try_consume(&self, account_id: AccountId, now: Instant) -> Result<(), Duration> {
        let mut bucket = self.buckets.entry(account_id).or_insert_with(|| TokenBucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.capacity / self.window_secs).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(missing * self.window_secs / self.capacity))
        }
    }

    /// Drop buckets that have refilled completely; they are indistinguishable from new ones
    fn prune(&self, now: Instant) {
        self.buckets.retain(|_, bucket| {
            let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens + elapsed * self.capacity / self.window_secs < self.capacity
        });
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    bets: Arc<Limiter>,
    seeds: Arc<Limiter>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            bets: Arc::new(Limiter::new(config.bet_points, config.bet_window_secs)),
            seeds: Arc::new(Limiter::new(config.seed_points, config.seed_window_secs)),
        }
    }

    /// `Err(retry_after_secs)` when the account is over its budget
    pub fn check(&self, scope: LimitScope, account_id: AccountId) -> Result<(), u64> {
        self.check_at(scope, account_id, Instant::now())
    }

    fn check_at(&self, scope: LimitScope, account_id: AccountId, now: Instant) -> Result<(), u64> {
        if !self.enabled {
            return Ok(());
        }
        let limiter = match scope {
            LimitScope::Bets => &self.bets,
            LimitScope::Seeds => &self.seeds,
        };
        limiter
            .try_consume(account_id, now)
            .map_err(|wait| wait.as_secs_f64().ceil().max(1.0) as u64)
    }

    pub fn prune_idle(&self) {
        self.prune_idle_at(Instant::now());
    }

    fn prune_idle_at(&self, now: Instant) {
        self.bets.prune(now);
        self.seeds.prune(now);
    }

    /// Buckets currently held across both scopes
    pub fn tracked_buckets(&self) -> usize {
        self.bets.buckets.len() + self.seeds.buckets.len()
    }

    /// Prune idle buckets every `every`
    pub fn start_pruning(&self, every: Duration) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                limiter.prune_idle();
                debug!(buckets = limiter.tracked_buckets(), "Pruned idle rate limit buckets");
            }
        });
    }
}
