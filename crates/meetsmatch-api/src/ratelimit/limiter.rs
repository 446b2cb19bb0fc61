//! Per-key rate limiter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use meetsmatch_core::config::RateLimitConfig;
use tracing::{error, warn};

use super::bucket::TokenBucket;

/// Token-bucket limiter keyed by user (or any caller-chosen key).
///
/// Buckets are created lazily on a key's first request and kept for the
/// lifetime of the limiter. Lookups take the map's read lock; creation
/// re-checks under the write lock so concurrent first requests share one
/// bucket. Token arithmetic holds only the per-bucket mutex.
pub struct RateLimiter {
    capacity: u32,
    refill_interval: Duration,
    buckets: RwLock<HashMap<String, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self {
            capacity,
            refill_interval,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.refill_interval())
    }

    /// Admit or reject one request for `key` now.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Admit or reject one request for `key` at `now`.
    ///
    /// A poisoned lock rejects the request.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let Some(bucket) = self.bucket(key, now) else {
            return false;
        };
        let Ok(mut bucket) = bucket.lock() else {
            error!(key, "Rate limiter bucket lock poisoned, rejecting");
            return false;
        };
        let allowed = bucket.try_take(now);
        if !allowed {
            warn!(key, "Rate limit exceeded");
        }
        allowed
    }

    fn bucket(&self, key: &str, now: Instant) -> Option<Arc<Mutex<TokenBucket>>> {
        {
            let Ok(buckets) = self.buckets.read() else {
                error!("Rate limiter map lock poisoned, rejecting");
                return None;
            };
            if let Some(bucket) = buckets.get(key) {
                return Some(Arc::clone(bucket));
            }
        }

        let Ok(mut buckets) = self.buckets.write() else {
            error!("Rate limiter map lock poisoned, rejecting");
            return None;
        };
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(TokenBucket::new(
                self.capacity,
                self.refill_interval,
                now,
            )))
        });
        Some(Arc::clone(bucket))
    }

    /// Number of keys that have a bucket.
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().map_or(0, |b| b.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn admits_capacity_then_rejects_then_refills_one() {
        let limiter = RateLimiter::new(5, SEC);
        let t0 = Instant::now();
        for i in 0..5 {
            assert!(limiter.allow_at("u1", t0), "request {i} should pass");
        }
        assert!(!limiter.allow_at("u1", t0));

        let t1 = t0 + SEC;
        assert!(limiter.allow_at("u1", t1));
        assert!(!limiter.allow_at("u1", t1));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, SEC);
        let t0 = Instant::now();
        assert!(limiter.allow_at("u1", t0));
        assert!(!limiter.allow_at("u1", t0));
        assert!(limiter.allow_at("u2", t0));
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn concurrent_first_requests_share_one_bucket() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(3600)));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.allow("shared"))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(admitted, 5);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn poisoned_map_fails_closed() {
        let limiter = Arc::new(RateLimiter::new(5, SEC));
        let poisoner = Arc::clone(&limiter);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.buckets.write().unwrap();
            panic!("poison the map");
        })
        .join();

        assert!(!limiter.allow("u1"));
    }
}
