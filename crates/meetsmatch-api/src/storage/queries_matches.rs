//! Match queries.

use meetsmatch_core::db::unix_timestamp;
use meetsmatch_core::lifecycle::ActionState;
use meetsmatch_core::models::{Match, MatchScore};

use super::db::{DatabaseError, MatchDatabase};
use super::models::{MatchRow, VersionedMatch};

impl MatchDatabase {
    // =========================================================================
    // Match queries
    // =========================================================================

    /// Insert a pending match for `(user1_id, user2_id)` unless one already
    /// exists for the unordered pair.
    ///
    /// Returns the stored row and whether this call created it.
    pub async fn insert_match_if_absent(
        &self,
        id: &str,
        user1_id: &str,
        user2_id: &str,
        score: &MatchScore,
    ) -> Result<(VersionedMatch, bool), DatabaseError> {
        let now = unix_timestamp();
        let score = serde_json::to_string(score).map_err(|e| DatabaseError::Query(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO matches (id, user1_id, user2_id, score, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user1_id)
        .bind(user2_id)
        .bind(score)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        let stored = self
            .find_match_by_pair(user1_id, user2_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Match for {user1_id}/{user2_id}")))?;

        Ok((stored, result.rows_affected() > 0))
    }

    /// Find the match for an unordered pair of users.
    pub async fn find_match_by_pair(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<VersionedMatch>, DatabaseError> {
        sqlx::query_as::<_, MatchRow>(
            "SELECT * FROM matches \
             WHERE (user1_id = ? AND user2_id = ?) OR (user1_id = ? AND user2_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(self.pool())
        .await?
        .map(VersionedMatch::try_from)
        .transpose()
    }

    /// Get a match by ID.
    pub async fn get_match(&self, id: &str) -> Result<VersionedMatch, DatabaseError> {
        sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Match {id}")))?
            .try_into()
    }

    /// Compare-and-set update of a match's status and actions.
    ///
    /// Only applies when the row is still at `expected_version`. Returns
    /// `false` when another writer got there first. `matched_at` and the
    /// match sequence number are stamped once and never overwritten.
    pub async fn update_match_guarded(
        &self,
        id: &str,
        expected_version: i64,
        state: &ActionState,
        matched_at: Option<i64>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE matches SET status = ?, user1_action = ?, user2_action = ?, \
             matched_at = COALESCE(matched_at, ?), \
             matched_seq = CASE WHEN matched_seq IS NULL AND ? IS NOT NULL \
                 THEN (SELECT COALESCE(MAX(matched_seq), 0) + 1 FROM matches) \
                 ELSE matched_seq END, \
             version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ?",
        )
        .bind(state.status.as_str())
        .bind(state.user1_action.as_str())
        .bind(state.user2_action.as_str())
        .bind(matched_at)
        .bind(matched_at)
        .bind(unix_timestamp())
        .bind(id)
        .bind(expected_version)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Matched pairs involving `user_id`, newest first.
    pub async fn list_matched(&self, user_id: &str, cap: u32) -> Result<Vec<Match>, DatabaseError> {
        let rows = sqlx::query_as::<_, MatchRow>(
            "SELECT * FROM matches \
             WHERE status = 'matched' AND (user1_id = ? OR user2_id = ?) \
             ORDER BY matched_at DESC, matched_seq DESC, id LIMIT ?",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(i64::from(cap))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| VersionedMatch::try_from(row).map(|m| m.snapshot))
            .collect()
    }
}
