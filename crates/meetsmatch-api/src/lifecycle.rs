//! Match creation and per-participant actions, applied atomically per row.

use std::sync::Arc;

use meetsmatch_core::db::unix_timestamp;
use meetsmatch_core::lifecycle::{ActionState, apply_action};
use meetsmatch_core::models::{Match, MatchAction};
use meetsmatch_core::scoring::CandidateScorer;
use tracing::{debug, info};

use crate::error::{MatchError, MatchResult};
use crate::storage::MatchDatabase;
use crate::users::UserDirectory;

/// Guarded-update attempts before giving up on a contended row.
pub const MAX_CAS_ATTEMPTS: u32 = 8;

/// Result of a like/dislike/skip.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub snapshot: Match,
    pub is_mutual: bool,
}

pub struct MatchLifecycle {
    db: MatchDatabase,
    users: Arc<UserDirectory>,
    scorer: CandidateScorer,
}

impl MatchLifecycle {
    pub const fn new(db: MatchDatabase, users: Arc<UserDirectory>, scorer: CandidateScorer) -> Self {
        Self { db, users, scorer }
    }

    /// Create the pending match for an unordered pair, or return the one that
    /// already exists. The flag is `true` when this call inserted the row.
    pub async fn create(&self, user1_id: &str, user2_id: &str) -> MatchResult<(Match, bool)> {
        if user1_id == user2_id {
            return Err(MatchError::invalid("Cannot match a user with themselves"));
        }

        if let Some(existing) = self
            .db
            .find_match_by_pair(user1_id, user2_id)
            .await
            .map_err(MatchError::internal("CreateMatch"))?
        {
            return Ok((existing.snapshot, false));
        }

        let user1 = self.users.get(user1_id).await?;
        let user2 = self.users.get(user2_id).await?;
        let score = self.scorer.score(&user1, &user2);

        let id = uuid::Uuid::new_v4().to_string();
        let (stored, created) = self
            .db
            .insert_match_if_absent(&id, user1_id, user2_id, &score)
            .await
            .map_err(MatchError::internal("CreateMatch"))?;

        if created {
            info!(match_id = %stored.snapshot.id, user1_id, user2_id, total = score.total, "Match created");
        }
        Ok((stored.snapshot, created))
    }

    pub async fn get(&self, match_id: &str) -> MatchResult<Match> {
        self.db
            .get_match(match_id)
            .await
            .map(|m| m.snapshot)
            .map_err(MatchError::internal("GetMatch"))
    }

    /// Record `action` by `user_id` on `match_id`.
    ///
    /// Reads the row, decides with the pure transition rules, and writes back
    /// only if nobody else committed in between; otherwise re-reads and
    /// decides again. The later of two concurrent likes therefore always
    /// sees the earlier one.
    pub async fn act(
        &self,
        match_id: &str,
        user_id: &str,
        action: MatchAction,
    ) -> MatchResult<ActionOutcome> {
        let operation = operation_name(action);

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self
                .db
                .get_match(match_id)
                .await
                .map_err(MatchError::internal(operation))?;
            let who = current.snapshot.participant(user_id).ok_or_else(|| {
                MatchError::PermissionDenied(format!("{user_id} is not a participant of {match_id}"))
            })?;

            let m = &current.snapshot;
            let transition = apply_action(
                ActionState {
                    status: m.status,
                    user1_action: m.user1_action,
                    user2_action: m.user2_action,
                },
                who,
                action,
            );
            let now = unix_timestamp();
            let matched_at = transition.became_matched.then_some(now);

            let applied = self
                .db
                .update_match_guarded(match_id, current.version, &transition.state, matched_at)
                .await
                .map_err(MatchError::internal(operation))?;

            if applied {
                let mut snapshot = current.snapshot;
                snapshot.status = transition.state.status;
                snapshot.user1_action = transition.state.user1_action;
                snapshot.user2_action = transition.state.user2_action;
                snapshot.matched_at = snapshot.matched_at.or(matched_at);
                snapshot.updated_at = now;

                if transition.became_matched {
                    info!(
                        match_id,
                        user_id,
                        counterpart_id = snapshot.counterpart_id(who),
                        "Mutual match"
                    );
                }
                return Ok(ActionOutcome {
                    snapshot,
                    is_mutual: transition.is_mutual,
                });
            }
            debug!(match_id, attempt, "Concurrent update, retrying");
        }

        Err(MatchError::Internal {
            operation,
            message: format!("{match_id}: gave up after {MAX_CAS_ATTEMPTS} contended attempts"),
        })
    }

    /// Matched pairs for `user_id`, newest first, at most `cap`.
    pub async fn list_matched(&self, user_id: &str, cap: u32) -> MatchResult<Vec<Match>> {
        self.db
            .list_matched(user_id, cap)
            .await
            .map_err(MatchError::internal("GetMatchList"))
    }
}

/// RPC name used when reporting failures of `action`.
pub const fn operation_name(action: MatchAction) -> &'static str {
    match action {
        MatchAction::Like => "LikeMatch",
        MatchAction::Dislike => "DislikeMatch",
        MatchAction::Skip => "SkipMatch",
        MatchAction::None => "MatchAction",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::CacheLayer;
    use meetsmatch_core::models::{MatchStatus, User};

    async fn setup() -> MatchLifecycle {
        let db = MatchDatabase::open_in_memory().await.unwrap();
        for id in ["a", "b", "c"] {
            db.upsert_user(&User {
                id: id.into(),
                first_name: id.into(),
                is_active: true,
                is_profile_complete: true,
                ..User::default()
            })
            .await
            .unwrap();
        }
        let users = Arc::new(UserDirectory::new(db.clone(), Arc::new(CacheLayer::disabled())));
        MatchLifecycle::new(db, users, CandidateScorer::default())
    }

    #[tokio::test]
    async fn create_is_idempotent_in_both_orders() {
        let lc = setup().await;
        let (first, created) = lc.create("a", "b").await.unwrap();
        assert!(created);
        assert_eq!(first.status, MatchStatus::Pending);

        let (again, created) = lc.create("a", "b").await.unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);

        let (reversed, created) = lc.create("b", "a").await.unwrap();
        assert!(!created);
        assert_eq!(reversed.id, first.id);
    }

    #[tokio::test]
    async fn create_rejects_self_and_unknown_users() {
        let lc = setup().await;
        assert!(matches!(lc.create("a", "a").await, Err(MatchError::InvalidArgument(_))));
        assert!(matches!(lc.create("a", "ghost").await, Err(MatchError::NotFound(_))));
    }

    #[tokio::test]
    async fn like_then_like_is_mutual() {
        let lc = setup().await;
        let (m, _) = lc.create("a", "b").await.unwrap();

        let first = lc.act(&m.id, "a", MatchAction::Like).await.unwrap();
        assert!(!first.is_mutual);
        assert_eq!(first.snapshot.status, MatchStatus::Pending);

        let second = lc.act(&m.id, "b", MatchAction::Like).await.unwrap();
        assert!(second.is_mutual);
        assert_eq!(second.snapshot.status, MatchStatus::Matched);
        assert!(second.snapshot.matched_at.is_some());

        let stored = lc.get(&m.id).await.unwrap();
        assert_eq!(stored.status, MatchStatus::Matched);
        assert_eq!(stored.matched_at, second.snapshot.matched_at);
        assert_eq!(lc.list_matched("a", 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn like_then_dislike_rejects() {
        let lc = setup().await;
        let (m, _) = lc.create("a", "b").await.unwrap();
        lc.act(&m.id, "a", MatchAction::Like).await.unwrap();

        let out = lc.act(&m.id, "b", MatchAction::Dislike).await.unwrap();
        assert!(!out.is_mutual);
        assert_eq!(out.snapshot.status, MatchStatus::Rejected);

        // Terminal: a later like records the action but stays rejected.
        let out = lc.act(&m.id, "b", MatchAction::Like).await.unwrap();
        assert_eq!(out.snapshot.status, MatchStatus::Rejected);
        assert_eq!(out.snapshot.user2_action, MatchAction::Like);
        assert!(!out.is_mutual);
    }

    #[tokio::test]
    async fn skip_leaves_status() {
        let lc = setup().await;
        let (m, _) = lc.create("a", "b").await.unwrap();
        let out = lc.act(&m.id, "a", MatchAction::Skip).await.unwrap();
        assert_eq!(out.snapshot.status, MatchStatus::Pending);
        assert_eq!(out.snapshot.user1_action, MatchAction::Skip);
    }

    #[tokio::test]
    async fn guards() {
        let lc = setup().await;
        let (m, _) = lc.create("a", "b").await.unwrap();
        assert!(matches!(
            lc.act(&m.id, "c", MatchAction::Like).await,
            Err(MatchError::PermissionDenied(_))
        ));
        assert!(matches!(
            lc.act("missing", "a", MatchAction::Like).await,
            Err(MatchError::NotFound(_))
        ));
    }
}
