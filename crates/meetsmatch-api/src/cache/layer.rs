//! Typed cache layer over a [`KvStore`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use meetsmatch_core::config::CacheConfig;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::store::{CacheError, KvStore};

/// TTL class of a cached payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    User,
    Match,
    Profile,
    Response,
    CommonResponse,
    FeatureFlag,
}

// =========================================================================
// Keys
// =========================================================================

pub fn user_key(user_id: &str) -> String {
    format!("user_data:{user_id}")
}

pub fn match_key(match_id: &str) -> String {
    format!("match:{match_id}")
}

pub fn common_response_key(name: &str) -> String {
    format!("common_response:{name}")
}

pub fn feature_key(name: &str) -> String {
    format!("feature:{name}")
}

/// Discovery page for a user. The limit segment is tagged so a numeric user
/// id can never collide with it during invalidation.
pub fn candidates_key(user_id: &str, limit: u32) -> String {
    format!("candidates:{user_id}:limit={limit}")
}

pub fn matches_key(user_id: &str) -> String {
    format!("matches:{user_id}")
}

/// `bot_response:<sha256(user:context:payload)>`.
pub fn response_key(user_id: &str, context_id: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{user_id}:{context_id}:{payload}").as_bytes());
    format!("bot_response:{:x}", hasher.finalize())
}

// =========================================================================
// Stats
// =========================================================================

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 when there were none.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =========================================================================
// Layer
// =========================================================================

/// JSON payload cache with per-class TTLs.
///
/// A layer built with [`CacheLayer::disabled`] (or from a config with
/// `enabled = false`) never stores anything and always misses.
pub struct CacheLayer {
    store: Option<Arc<dyn KvStore>>,
    config: CacheConfig,
    counters: Counters,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        let store = config.enabled.then_some(store);
        Self {
            store,
            config,
            counters: Counters::default(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            store: None,
            config: CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
            counters: Counters::default(),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub const fn ttl(&self, class: TtlClass) -> Duration {
        let secs = match class {
            TtlClass::User => self.config.user_ttl_secs,
            TtlClass::Match => self.config.match_ttl_secs,
            TtlClass::Profile => self.config.profile_ttl_secs,
            TtlClass::Response => self.config.response_ttl_secs,
            TtlClass::CommonResponse => self.config.common_response_ttl_secs,
            TtlClass::FeatureFlag => self.config.feature_flag_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// Whether `payload` matches a skip pattern and must always run fresh.
    pub fn should_skip(&self, payload: &str) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|p| payload.contains(p.as_str()))
    }

    fn record_error(&self, e: &CacheError) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        debug!(error = %e, "Cache store error");
    }

    /// Fetch and decode a payload.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let raw = store.get(key).await.inspect_err(|e| self.record_error(e))?;
        match raw {
            Some(raw) => {
                let value = serde_json::from_str(&raw).map_err(|e| {
                    let e = CacheError::from(e);
                    self.record_error(&e);
                    e
                })?;
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Encode and store a payload under `key` with the TTL of `class`.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        class: TtlClass,
    ) -> Result<(), CacheError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let raw = serde_json::to_string(value)?;
        store
            .set(key, raw, self.ttl(class))
            .await
            .inspect_err(|e| self.record_error(e))?;
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let removed = store.delete(key).await.inspect_err(|e| self.record_error(e))?;
        if removed {
            self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Remove every entry whose key has `user_id` as a complete
    /// `:`-separated segment.
    pub async fn invalidate_user(&self, user_id: &str) -> Result<u64, CacheError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let mut removed = 0;
        for pattern in [format!("*:{user_id}"), format!("*:{user_id}:*")] {
            removed += store
                .delete_pattern(&pattern)
                .await
                .inspect_err(|e| self.record_error(e))?;
        }
        self.counters.deletes.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    pub async fn invalidate_match(&self, match_id: &str) -> Result<bool, CacheError> {
        self.delete(&match_key(match_id)).await
    }

    // =========================================================================
    // Keyed responses
    // =========================================================================

    /// Cached response for `(user, context, payload)`, unless the payload is
    /// on the skip list.
    pub async fn get_response<T: DeserializeOwned>(
        &self,
        user_id: &str,
        context_id: &str,
        payload: &str,
    ) -> Result<Option<T>, CacheError> {
        if self.should_skip(payload) {
            return Ok(None);
        }
        self.get(&response_key(user_id, context_id, payload)).await
    }

    /// Store a response; skipped payloads are never written.
    pub async fn put_response<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        context_id: &str,
        payload: &str,
        value: &T,
    ) -> Result<bool, CacheError> {
        if self.should_skip(payload) {
            return Ok(false);
        }
        self.set(&response_key(user_id, context_id, payload), value, TtlClass::Response)
            .await?;
        Ok(true)
    }

    // =========================================================================
    // Warming and immutable lookups
    // =========================================================================

    /// Pre-populate feature flags and common responses. Idempotent.
    ///
    /// Individual failures are logged; returns how many entries were written.
    pub async fn warm(
        &self,
        feature_flags: &HashMap<String, bool>,
        common_responses: &HashMap<String, String>,
    ) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let mut written = 0;
        for (name, enabled) in feature_flags {
            match self.set(&feature_key(name), enabled, TtlClass::FeatureFlag).await {
                Ok(()) => written += 1,
                Err(e) => warn!(flag = %name, error = %e, "Failed to warm feature flag"),
            }
        }
        for (name, text) in common_responses {
            match self
                .set(&common_response_key(name), text, TtlClass::CommonResponse)
                .await
            {
                Ok(()) => written += 1,
                Err(e) => warn!(response = %name, error = %e, "Failed to warm common response"),
            }
        }
        info!(written, "Cache warmed");
        written
    }

    pub async fn feature_flag(&self, name: &str) -> Option<bool> {
        self.get(&feature_key(name))
            .await
            .inspect_err(|e| warn!(flag = %name, error = %e, "Feature flag lookup failed"))
            .ok()
            .flatten()
    }

    pub async fn common_response(&self, name: &str) -> Option<String> {
        self.get(&common_response_key(name))
            .await
            .inspect_err(|e| warn!(response = %name, error = %e, "Common response lookup failed"))
            .ok()
            .flatten()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn layer() -> CacheLayer {
        CacheLayer::new(Arc::new(MemoryStore::new()), CacheConfig::default())
    }

    #[test]
    fn response_keys_are_deterministic_and_distinct() {
        let a = response_key("u1", "chat1", "/match");
        assert_eq!(a, response_key("u1", "chat1", "/match"));
        assert_ne!(a, response_key("u2", "chat1", "/match"));
        assert_ne!(a, response_key("u1", "chat2", "/match"));
        assert_ne!(a, response_key("u1", "chat1", "/matches"));
        // 256-bit hex digest
        assert_eq!(a.len(), "bot_response:".len() + 64);
    }

    #[tokio::test]
    async fn typed_round_trip_and_stats() {
        let cache = layer();
        assert_eq!(cache.get::<Vec<u32>>("k").await.unwrap(), None);
        cache.set("k", &vec![1u32, 2, 3], TtlClass::Match).await.unwrap();
        assert_eq!(cache.get::<Vec<u32>>("k").await.unwrap(), Some(vec![1, 2, 3]));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn skip_patterns_bypass_response_cache() {
        let cache = layer();
        assert!(!cache.put_response("u1", "c1", "/start", "hi").await.unwrap());
        assert!(!cache.put_response("u1", "c1", "admin_ban u2", "ok").await.unwrap());
        assert!(cache.put_response("u1", "c1", "/match", "list").await.unwrap());

        assert_eq!(cache.get_response::<String>("u1", "c1", "/start").await.unwrap(), None);
        assert_eq!(
            cache.get_response::<String>("u1", "c1", "/match").await.unwrap().as_deref(),
            Some("list")
        );
    }

    #[tokio::test]
    async fn invalidate_user_only_touches_that_user() {
        let cache = layer();
        for key in [
            user_key("u1"),
            // Written by the profile front-end sharing the store.
            "profile:u1".to_string(),
            candidates_key("u1", 10),
            matches_key("u1"),
            user_key("u10"),
            candidates_key("u10", 1),
            matches_key("u2"),
            candidates_key("u2", 1),
        ] {
            cache.set(&key, &1, TtlClass::User).await.unwrap();
        }

        assert_eq!(cache.invalidate_user("u1").await.unwrap(), 4);
        assert!(cache.get::<i32>(&user_key("u1")).await.unwrap().is_none());
        assert!(cache.get::<i32>(&candidates_key("u1", 10)).await.unwrap().is_none());
        assert!(cache.get::<i32>(&user_key("u10")).await.unwrap().is_some());
        assert!(cache.get::<i32>(&candidates_key("u10", 1)).await.unwrap().is_some());
        assert!(cache.get::<i32>(&matches_key("u2")).await.unwrap().is_some());
        assert!(cache.get::<i32>(&candidates_key("u2", 1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn numeric_user_ids_do_not_collide_with_limits() {
        let cache = layer();
        cache.set(&candidates_key("7", 10), &1, TtlClass::User).await.unwrap();
        assert_eq!(cache.invalidate_user("10").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn warm_populates_flags_and_responses() {
        let cache = layer();
        let config = meetsmatch_core::Config::default();
        let written = cache.warm(&config.feature_flags, &config.common_responses).await;
        assert_eq!(written, config.feature_flags.len() + config.common_responses.len());

        assert_eq!(cache.feature_flag("enable_profile_verification").await, Some(false));
        assert_eq!(cache.feature_flag("missing").await, None);
        assert!(cache.common_response("welcome_message").await.is_some());

        // Warming twice is harmless.
        cache.warm(&config.feature_flags, &config.common_responses).await;
        assert_eq!(cache.feature_flag("enable_voice_messages").await, Some(true));
    }

    #[tokio::test]
    async fn disabled_layer_is_a_no_op() {
        let cache = CacheLayer::disabled();
        cache.set("k", &1, TtlClass::User).await.unwrap();
        assert_eq!(cache.get::<i32>("k").await.unwrap(), None);
        assert_eq!(cache.invalidate_user("u1").await.unwrap(), 0);
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn ttl_classes_follow_config() {
        let cache = layer();
        assert_eq!(cache.ttl(TtlClass::User), Duration::from_secs(1800));
        assert_eq!(cache.ttl(TtlClass::Match), Duration::from_secs(7200));
        assert_eq!(cache.ttl(TtlClass::FeatureFlag), Duration::from_secs(86400));
    }
}
