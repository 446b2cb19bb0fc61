//! Candidate discovery: filter, score, and rank potential matches.

use std::sync::Arc;

use meetsmatch_core::config::MatchingConfig;
use meetsmatch_core::models::{MatchScore, User};
use meetsmatch_core::scoring::CandidateScorer;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MatchError, MatchResult};
use crate::storage::MatchDatabase;
use crate::users::UserDirectory;

/// A ranked candidate and its (ephemeral) score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub user: User,
    pub score: MatchScore,
}

pub struct MatchingEngine {
    db: MatchDatabase,
    users: Arc<UserDirectory>,
    scorer: CandidateScorer,
    overfetch_factor: u32,
}

impl MatchingEngine {
    pub fn new(db: MatchDatabase, users: Arc<UserDirectory>, config: &MatchingConfig) -> Self {
        Self {
            db,
            users,
            scorer: CandidateScorer::new(config.default_max_distance_km),
            overfetch_factor: config.overfetch_factor,
        }
    }

    pub const fn scorer(&self) -> &CandidateScorer {
        &self.scorer
    }

    /// Up to `limit` candidates for `requester_id`, best first.
    ///
    /// An inactive requester or one with an incomplete profile gets an empty
    /// list. Scores are not persisted.
    pub async fn potential_matches(
        &self,
        requester_id: &str,
        limit: u32,
    ) -> MatchResult<Vec<ScoredCandidate>> {
        let requester = self.users.get(requester_id).await?;
        if !requester.is_discoverable() {
            debug!(requester_id, "Requester not discoverable, no candidates");
            return Ok(Vec::new());
        }

        let fetch_limit = limit.saturating_mul(self.overfetch_factor);
        let rows = self
            .db
            .find_candidates(&requester, fetch_limit)
            .await
            .map_err(MatchError::internal("GetPotentialMatches"))?;
        let fetched = rows.len();

        let mut ranked: Vec<ScoredCandidate> = rows
            .into_iter()
            .filter(|c| CandidateScorer::within_max_distance(&requester, c))
            .map(|user| ScoredCandidate {
                score: self.scorer.score(&requester, &user),
                user,
            })
            .collect();
        // Stable: equal totals keep query order.
        ranked.sort_by(|a, b| b.score.total.total_cmp(&a.score.total));
        ranked.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        debug!(requester_id, fetched, returned = ranked.len(), "Ranked candidates");
        Ok(ranked)
    }
}
