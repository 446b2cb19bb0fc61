//! Entry point for every matching operation.
//!
//! Each call runs the same pipeline: validate ids, pass the rate limiter,
//! try the cache, run the engine or lifecycle under the operation timeout,
//! write back to the cache unless the caller cancelled, invalidate what a
//! state change touched, and queue a last-active update for the actor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use meetsmatch_core::Config;
use meetsmatch_core::models::{Match, MatchAction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::activity::ActivityTracker;
use crate::cache::{CacheLayer, KvStore, TtlClass, candidates_key, match_key, matches_key};
use crate::engine::{MatchingEngine, ScoredCandidate};
use crate::error::{MatchError, MatchResult};
use crate::lifecycle::{ActionOutcome, MatchLifecycle, operation_name};
use crate::ratelimit::RateLimiter;
use crate::storage::MatchDatabase;
use crate::users::UserDirectory;

/// Largest page a caller may request from discovery.
pub const MAX_CANDIDATE_LIMIT: u32 = 100;

const MAX_ID_LEN: usize = 128;

/// Reject empty, oversized, or wildcard/separator-bearing identifiers.
fn require_id(field: &'static str, value: &str) -> MatchResult<()> {
    if value.trim().is_empty() {
        return Err(MatchError::invalid(format!("{field} is required")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(MatchError::invalid(format!("{field} is too long")));
    }
    if value.contains([':', '*']) {
        return Err(MatchError::invalid(format!("{field} contains reserved characters")));
    }
    Ok(())
}

pub struct MatchGateway {
    engine: MatchingEngine,
    lifecycle: MatchLifecycle,
    cache: Arc<CacheLayer>,
    limiter: Arc<RateLimiter>,
    activity: Arc<ActivityTracker>,
    operation_timeout: Duration,
    default_limit: u32,
    match_list_cap: u32,
}

impl MatchGateway {
    /// Wire the gateway from explicit collaborators.
    pub fn new(
        db: MatchDatabase,
        cache: Arc<CacheLayer>,
        limiter: Arc<RateLimiter>,
        activity: Arc<ActivityTracker>,
        config: &Config,
    ) -> Self {
        let users = Arc::new(UserDirectory::new(db.clone(), Arc::clone(&cache)));
        let engine = MatchingEngine::new(db.clone(), Arc::clone(&users), &config.matching);
        let lifecycle = MatchLifecycle::new(db, users, *engine.scorer());
        Self {
            engine,
            lifecycle,
            cache,
            limiter,
            activity,
            operation_timeout: config.timeouts.operation_timeout(),
            default_limit: config.matching.default_limit,
            match_list_cap: config.matching.match_list_cap,
        }
    }

    /// Build every collaborator from `config`. Must run inside a runtime.
    pub fn from_config(db: MatchDatabase, store: Arc<dyn KvStore>, config: &Config) -> Self {
        let cache = Arc::new(CacheLayer::new(store, config.cache.clone()));
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let activity = Arc::new(ActivityTracker::spawn(Arc::new(db.clone()), &config.activity));
        Self::new(db, cache, limiter, activity, config)
    }

    pub const fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    pub const fn activity(&self) -> &Arc<ActivityTracker> {
        &self.activity
    }

    // =========================================================================
    // Pipeline steps
    // =========================================================================

    fn admit(&self, key: &str) -> MatchResult<()> {
        if self.limiter.allow(key) {
            Ok(())
        } else {
            Err(MatchError::RateLimited(key.to_string()))
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = MatchResult<T>>,
    ) -> MatchResult<T> {
        tokio::time::timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| MatchError::Timeout { operation })?
    }

    /// Cache read; any failure or timeout is a miss.
    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match tokio::time::timeout(self.operation_timeout, self.cache.get::<T>(key)).await {
            Ok(Ok(hit)) => hit,
            Ok(Err(e)) => {
                warn!(key, error = %e, "Cache read failed");
                None
            }
            Err(_) => {
                warn!(key, "Cache read timed out");
                None
            }
        }
    }

    /// Cache write, skipped when the caller has gone away.
    async fn write_back<T: Serialize + ?Sized>(
        &self,
        cancel: &CancellationToken,
        key: &str,
        value: &T,
        class: TtlClass,
    ) {
        if cancel.is_cancelled() {
            debug!(key, "Caller cancelled, not caching result");
            return;
        }
        match tokio::time::timeout(self.operation_timeout, self.cache.set(key, value, class)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(key, error = %e, "Cache write failed"),
            Err(_) => warn!(key, "Cache write timed out"),
        }
    }

    /// Best-effort invalidation after a state change.
    async fn invalidate(&self, match_id: Option<&str>, user_ids: &[&str]) {
        let work = async {
            if let Some(match_id) = match_id {
                if let Err(e) = self.cache.invalidate_match(match_id).await {
                    warn!(match_id, error = %e, "Match cache invalidation failed");
                }
            }
            for user_id in user_ids {
                if let Err(e) = self.cache.invalidate_user(user_id).await {
                    warn!(user_id, error = %e, "User cache invalidation failed");
                }
            }
        };
        if tokio::time::timeout(self.operation_timeout, work).await.is_err() {
            warn!(?match_id, "Cache invalidation timed out");
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Ranked candidates for `user_id`. `limit <= 0` uses the configured
    /// default; larger requests are capped at [`MAX_CANDIDATE_LIMIT`].
    pub async fn potential_matches(
        &self,
        user_id: &str,
        limit: i32,
        cancel: &CancellationToken,
    ) -> MatchResult<Vec<ScoredCandidate>> {
        require_id("user_id", user_id)?;
        self.admit(user_id)?;

        let limit = u32::try_from(limit)
            .ok()
            .filter(|&l| l > 0)
            .unwrap_or(self.default_limit)
            .min(MAX_CANDIDATE_LIMIT);
        let key = candidates_key(user_id, limit);

        let candidates = if let Some(hit) = self.cached::<Vec<ScoredCandidate>>(&key).await {
            hit
        } else {
            let fresh = self
                .bounded(
                    "GetPotentialMatches",
                    self.engine.potential_matches(user_id, limit),
                )
                .await?;
            self.write_back(cancel, &key, &fresh, TtlClass::Response).await;
            fresh
        };

        self.activity.record(user_id);
        Ok(candidates)
    }

    /// Create (or fetch) the match for an unordered pair.
    pub async fn create_match(
        &self,
        user1_id: &str,
        user2_id: &str,
        cancel: &CancellationToken,
    ) -> MatchResult<Match> {
        require_id("user1_id", user1_id)?;
        require_id("user2_id", user2_id)?;
        self.admit(user1_id)?;

        let (snapshot, created) = self
            .bounded("CreateMatch", self.lifecycle.create(user1_id, user2_id))
            .await?;

        if created {
            // Both users' discovery pages may list each other.
            self.invalidate(None, &[user1_id, user2_id]).await;
        }
        self.write_back(cancel, &match_key(&snapshot.id), &snapshot, TtlClass::Match)
            .await;
        self.activity.record(user1_id);
        Ok(snapshot)
    }

    pub async fn get_match(&self, match_id: &str, cancel: &CancellationToken) -> MatchResult<Match> {
        require_id("match_id", match_id)?;
        let key = match_key(match_id);
        self.admit(&key)?;

        if let Some(hit) = self.cached::<Match>(&key).await {
            return Ok(hit);
        }
        let snapshot = self
            .bounded("GetMatch", self.lifecycle.get(match_id))
            .await?;
        self.write_back(cancel, &key, &snapshot, TtlClass::Match).await;
        Ok(snapshot)
    }

    pub async fn like_match(&self, match_id: &str, user_id: &str) -> MatchResult<ActionOutcome> {
        self.act(match_id, user_id, MatchAction::Like).await
    }

    pub async fn dislike_match(&self, match_id: &str, user_id: &str) -> MatchResult<Match> {
        self.act(match_id, user_id, MatchAction::Dislike)
            .await
            .map(|o| o.snapshot)
    }

    pub async fn skip_match(&self, match_id: &str, user_id: &str) -> MatchResult<Match> {
        self.act(match_id, user_id, MatchAction::Skip)
            .await
            .map(|o| o.snapshot)
    }

    async fn act(
        &self,
        match_id: &str,
        user_id: &str,
        action: MatchAction,
    ) -> MatchResult<ActionOutcome> {
        require_id("match_id", match_id)?;
        require_id("user_id", user_id)?;
        self.admit(user_id)?;

        let outcome = self
            .bounded(operation_name(action), self.lifecycle.act(match_id, user_id, action))
            .await?;

        let m = &outcome.snapshot;
        self.invalidate(Some(&m.id), &[m.user1_id.as_str(), m.user2_id.as_str()])
            .await;
        self.activity.record(user_id);
        Ok(outcome)
    }

    /// Mutual matches for `user_id`, newest first.
    pub async fn match_list(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> MatchResult<Vec<Match>> {
        require_id("user_id", user_id)?;
        self.admit(user_id)?;

        let key = matches_key(user_id);
        let matches = if let Some(hit) = self.cached::<Vec<Match>>(&key).await {
            hit
        } else {
            let fresh = self
                .bounded(
                    "GetMatchList",
                    self.lifecycle.list_matched(user_id, self.match_list_cap),
                )
                .await?;
            self.write_back(cancel, &key, &fresh, TtlClass::Match).await;
            fresh
        };

        self.activity.record(user_id);
        Ok(matches)
    }

    /// Queue a last-active update. Returns whether it was accepted.
    pub fn update_last_active(&self, user_id: &str) -> MatchResult<bool> {
        require_id("user_id", user_id)?;
        Ok(self.activity.record(user_id))
    }
}
