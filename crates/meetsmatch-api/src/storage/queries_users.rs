//! User queries.

use meetsmatch_core::db::unix_timestamp;
use meetsmatch_core::models::User;
use sqlx::{QueryBuilder, Sqlite};
use tracing::warn;

use super::db::{DatabaseError, MatchDatabase};
use super::models::UserRow;

impl MatchDatabase {
    // =========================================================================
    // User queries
    // =========================================================================

    /// Insert or replace a user snapshot.
    ///
    /// Profiles are owned by the account subsystem; this is the seam it (and
    /// seeding/tests) writes through.
    pub async fn upsert_user(&self, user: &User) -> Result<(), DatabaseError> {
        user.preferences
            .validate()
            .map_err(|e| DatabaseError::InvalidInput(format!("User {}: {e}", user.id)))?;

        let now = unix_timestamp();
        let interests = serde_json::to_string(&user.interests)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let preferences = serde_json::to_string(&user.preferences)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let location = user.location.as_ref();

        sqlx::query(
            "INSERT INTO users (id, username, first_name, age, gender, interests, latitude, longitude, \
             city, country, preferences, is_active, is_sleeping, is_profile_complete, created_at, \
             updated_at, last_active) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             username = excluded.username, first_name = excluded.first_name, age = excluded.age, \
             gender = excluded.gender, interests = excluded.interests, \
             latitude = excluded.latitude, longitude = excluded.longitude, city = excluded.city, \
             country = excluded.country, preferences = excluded.preferences, \
             is_active = excluded.is_active, is_sleeping = excluded.is_sleeping, \
             is_profile_complete = excluded.is_profile_complete, updated_at = excluded.updated_at, \
             last_active = max(users.last_active, excluded.last_active)",
        )
        .bind(&user.id)
        .bind(user.username.as_deref())
        .bind(&user.first_name)
        .bind(user.age)
        .bind(user.gender.map(|g| g.as_str()))
        .bind(interests)
        .bind(location.map(|l| l.latitude))
        .bind(location.map(|l| l.longitude))
        .bind(location.and_then(|l| l.city.as_deref()))
        .bind(location.and_then(|l| l.country.as_deref()))
        .bind(preferences)
        .bind(user.is_active)
        .bind(user.is_sleeping)
        .bind(user.is_profile_complete)
        .bind(now)
        .bind(now)
        .bind(user.last_active)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))?
            .try_into()
    }

    /// Fetch up to `fetch_limit` discovery candidates for `requester`.
    ///
    /// Excludes the requester, inactive/incomplete/sleeping users, and anyone
    /// who already shares a match row with the requester in either
    /// direction. The requester's age range and gender preference are
    /// applied as hard filters when set. Rows whose JSON columns fail to
    /// decode are dropped with a warning.
    pub async fn find_candidates(
        &self,
        requester: &User,
        fetch_limit: u32,
    ) -> Result<Vec<User>, DatabaseError> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT u.* FROM users u \
             WHERE u.is_active = 1 AND u.is_profile_complete = 1 AND u.is_sleeping = 0 \
             AND u.id <> ",
        );
        qb.push_bind(&requester.id);
        qb.push(
            " AND NOT EXISTS (SELECT 1 FROM matches m \
             WHERE (m.user1_id = ",
        );
        qb.push_bind(&requester.id);
        qb.push(" AND m.user2_id = u.id) OR (m.user2_id = ");
        qb.push_bind(&requester.id);
        qb.push(" AND m.user1_id = u.id))");

        let prefs = &requester.preferences;
        let (min_age, max_age) = prefs.age_bounds();
        if let Some(min_age) = min_age {
            qb.push(" AND u.age >= ");
            qb.push_bind(min_age);
        }
        if let Some(max_age) = max_age {
            qb.push(" AND u.age <= ");
            qb.push_bind(max_age);
        }
        if !prefs.gender_preference.is_empty() {
            qb.push(" AND u.gender IN (");
            let mut genders = qb.separated(", ");
            for gender in &prefs.gender_preference {
                genders.push_bind(gender.as_str());
            }
            genders.push_unseparated(")");
        }

        qb.push(" ORDER BY u.last_active DESC, u.id LIMIT ");
        qb.push_bind(i64::from(fetch_limit));

        let rows = qb
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                User::try_from(row)
                    .inspect_err(|e| warn!(user_id = %id, error = %e, "Skipping malformed candidate"))
                    .ok()
            })
            .collect())
    }

    /// Record activity for a user. Returns `false` if the user does not exist.
    pub async fn touch_last_active(&self, user_id: &str, at: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET last_active = max(last_active, ?) WHERE id = ?",
        )
        .bind(at)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
