//! Sliding-window rate limiter for market data providers.
//!
//! Keeps a call ledger per provider: the instants of successful calls made
//! in the trailing 60 seconds. A provider may be called while the number of
//! calls in the window is below its per-minute limit.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::provider::RateLimit;

/// Length of the rate-limit window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Per-provider call ledger.
///
/// Thread-safe; all state sits behind mutexes that recover from poisoning.
/// Providers without an explicit configuration get [`RateLimit::default`].
pub struct RateLimiter {
    /// Call instants per provider, oldest first.
    ledger: Mutex<HashMap<String, VecDeque<Instant>>>,
    /// Per-provider limits.
    configs: Mutex<HashMap<String, RateLimit>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(HashMap::new()),
            configs: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the ledger mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovery is a slightly wrong count, which is
    /// better than panicking.
    fn lock_ledger(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.ledger.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter ledger mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Lock the configs mutex, recovering from poison if necessary.
    fn lock_configs(&self) -> MutexGuard<'_, HashMap<String, RateLimit>> {
        self.configs.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter configs mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure the limit for a provider. Recorded calls are kept.
    pub fn configure(&self, provider: &str, limit: RateLimit) {
        debug!(
            "Rate limiter: {} limited to {} calls/min",
            provider, limit.requests_per_minute
        );
        self.lock_configs().insert(provider.to_string(), limit);
    }

    /// Calls per minute allowed for a provider.
    pub fn limit(&self, provider: &str) -> u32 {
        self.lock_configs()
            .get(provider)
            .cloned()
            .unwrap_or_default()
            .requests_per_minute
    }

    /// Whether the provider may be called now.
    pub fn may_call(&self, provider: &str) -> bool {
        self.may_call_at(provider, Instant::now())
    }

    /// Whether the provider may be called at `now`.
    ///
    /// Prunes the provider's entries that fell out of the window.
    pub fn may_call_at(&self, provider: &str, now: Instant) -> bool {
        let limit = self.limit(provider) as usize;
        let mut ledger = self.lock_ledger();

        let count = match ledger.get_mut(provider) {
            Some(calls) => {
                prune(calls, now);
                calls.len()
            }
            None => 0,
        };

        if count >= limit {
            debug!(
                "Rate limiter: {} has used {}/{} calls in the last minute",
                provider, count, limit
            );
            return false;
        }
        true
    }

    /// Record a successful call made now.
    pub fn record_call(&self, provider: &str) {
        self.record_call_at(provider, Instant::now());
    }

    /// Record a successful call made at `now`.
    pub fn record_call_at(&self, provider: &str, now: Instant) {
        let mut ledger = self.lock_ledger();
        let calls = ledger.entry(provider.to_string()).or_default();
        prune(calls, now);
        calls.push_back(now);
    }

    /// Number of calls in the window ending at `now`. Does not prune.
    pub fn recent_calls_at(&self, provider: &str, now: Instant) -> usize {
        self.lock_ledger()
            .get(provider)
            .map(|calls| calls.iter().filter(|t| in_window(**t, now)).count())
            .unwrap_or(0)
    }

    /// Calls left in the current window. Does not prune.
    pub fn remaining(&self, provider: &str) -> u32 {
        self.remaining_at(provider, Instant::now())
    }

    pub fn remaining_at(&self, provider: &str, now: Instant) -> u32 {
        let used = self.recent_calls_at(provider, now);
        let used = u32::try_from(used).unwrap_or(u32::MAX);
        self.limit(provider).saturating_sub(used)
    }

    #[cfg(test)]
    fn ledger_len(&self, provider: &str) -> usize {
        self.lock_ledger().get(provider).map_or(0, |c| c.len())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn in_window(call: Instant, now: Instant) -> bool {
    now.saturating_duration_since(call) < WINDOW
}

fn prune(calls: &mut VecDeque<Instant>, now: Instant) {
    while calls.front().is_some_and(|t| !in_window(*t, now)) {
        calls.pop_front();
    }
}
