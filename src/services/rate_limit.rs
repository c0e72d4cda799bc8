//! Per-key rate limiting
//!
//! Each API key gets two governor limiters: a sustained quota
//! (`requests` per `window_secs`) and a short burst quota (`burst` per
//! `burst_window_secs`). A request must pass both.
//!
//! Limiters idle for longer than their widest window are fully replenished
//! and get pruned once the map grows, so keys that stop calling do not stay
//! tracked forever.

use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{AuthDecision, RateLimits};
use crate::utils::{GatekeeperError, GatekeeperResult};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Map size below which no pruning happens
const PRUNE_MIN_KEYS: usize = 1024;

struct KeyLimiters {
    limits: RateLimits,
    sustained: DirectLimiter,
    burst: DirectLimiter,
    created: Instant,
    /// Milliseconds after `created` of the last check
    last_seen_ms: AtomicU64,
}

impl KeyLimiters {
    fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            sustained: RateLimiter::direct(quota(limits.requests, limits.window_secs)),
            burst: RateLimiter::direct(quota(limits.burst, limits.burst_window_secs)),
            created: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
        }
    }

    fn mark_seen(&self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.created).as_millis();
        self.last_seen_ms
            .fetch_max(u64::try_from(elapsed).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// True once both quotas have had a full window to replenish
    fn is_idle(&self, now: Instant) -> bool {
        let widest = self.limits.window_secs.max(self.limits.burst_window_secs).max(1);
        let last_seen = self.created + Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        now.saturating_duration_since(last_seen) > Duration::from_secs(widest)
    }
}

#[derive(Default)]
struct LimiterMap {
    entries: HashMap<Uuid, Arc<KeyLimiters>>,
    /// Size at which the next insertion prunes idle entries
    prune_at: usize,
}

impl LimiterMap {
    /// Drop idle limiters and return how many were removed
    fn prune_idle(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, limiters| !limiters.is_idle(now));
        self.prune_at = (self.entries.len() * 2).max(PRUNE_MIN_KEYS);
        before - self.entries.len()
    }
}

/// `count` cells replenished evenly over `window_secs`
fn quota(count: u32, window_secs: u64) -> Quota {
    let count = NonZeroU32::new(count).unwrap_or(NonZeroU32::MIN);
    let window = Duration::from_secs(window_secs.max(1));
    let period = (window / count.get()).max(Duration::from_millis(1));

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(count))
        .allow_burst(count)
}

/// Thread-safe map of API key ids to their limiters
#[derive(Clone, Default)]
pub struct KeyRateLimiter {
    limiters: Arc<RwLock<LimiterMap>>,
}

impl KeyRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_limiters(&self, key_id: Uuid, limits: RateLimits) -> Arc<KeyLimiters> {
        {
            let limiters = self.limiters.read().await;
            if let Some(existing) = limiters.entries.get(&key_id) {
                if existing.limits == limits {
                    return existing.clone();
                }
            }
        }

        let mut limiters = self.limiters.write().await;

        // Double-check after acquiring write lock
        if let Some(existing) = limiters.entries.get(&key_id) {
            if existing.limits == limits {
                return existing.clone();
            }
        }

        if limiters.entries.len() >= limiters.prune_at.max(PRUNE_MIN_KEYS) {
            let pruned = limiters.prune_idle(Instant::now());
            debug!(pruned = pruned, tracked = limiters.entries.len(), "Pruned idle rate limiters");
        }

        let created = Arc::new(KeyLimiters::new(limits));
        limiters.entries.insert(key_id, created.clone());
        created
    }

    /// Consume one request from the key's quotas
    pub async fn check(&self, decision: &AuthDecision) -> GatekeeperResult<()> {
        let limiters = self
            .get_limiters(decision.api_key_id, decision.rate_limits)
            .await;
        limiters.mark_seen(Instant::now());
        let clock = DefaultClock::default();

        for limiter in [&limiters.burst, &limiters.sustained] {
            if let Err(not_until) = limiter.check() {
                let wait = not_until.wait_time_from(clock.now());
                let retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX).max(1);
                warn!(
                    key_id = %decision.api_key_id,
                    retry_after_ms = retry_after_ms,
                    "Rate limit exceeded"
                );
                return Err(GatekeeperError::RateLimited { retry_after_ms });
            }
        }

        debug!(key_id = %decision.api_key_id, "Rate limit check passed");
        Ok(())
    }

    /// Drop a key's limiters, e.g. after revocation
    pub async fn forget(&self, key_id: Uuid) {
        self.limiters.write().await.entries.remove(&key_id);
    }

    pub async fn tracked_keys(&self) -> usize {
        self.limiters.read().await.entries.len()
    }
}
