//! Row types for matching storage and their conversion into domain models.

use meetsmatch_core::models::{
    Gender, Location, Match, MatchAction, MatchScore, MatchStatus, Preferences, User,
};

use super::db::DatabaseError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: Option<String>,
    pub first_name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub interests: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub preferences: String,
    pub is_active: bool,
    pub is_sleeping: bool,
    pub is_profile_complete: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_active: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MatchRow {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub status: String,
    pub user1_action: String,
    pub user2_action: String,
    pub score: String,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub matched_at: Option<i64>,
}

/// A match snapshot together with the row version used for guarded updates.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedMatch {
    pub snapshot: Match,
    pub version: i64,
}

fn malformed(kind: &str, id: &str, err: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::Query(format!("Malformed {kind} row {id}: {err}"))
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let gender = row
            .gender
            .as_deref()
            .map(str::parse::<Gender>)
            .transpose()
            .map_err(|e| malformed("user", &row.id, e))?;
        let interests =
            serde_json::from_str(&row.interests).map_err(|e| malformed("user", &row.id, e))?;
        let preferences: Preferences =
            serde_json::from_str(&row.preferences).map_err(|e| malformed("user", &row.id, e))?;
        let location = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location {
                latitude,
                longitude,
                city: row.city,
                country: row.country,
            }),
            _ => None,
        };

        Ok(Self {
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            age: row.age,
            gender,
            interests,
            location,
            preferences,
            is_active: row.is_active,
            is_sleeping: row.is_sleeping,
            is_profile_complete: row.is_profile_complete,
            last_active: row.last_active,
        })
    }
}

impl TryFrom<MatchRow> for VersionedMatch {
    type Error = DatabaseError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        let status: MatchStatus = row.status.parse().map_err(|e| malformed("match", &row.id, e))?;
        let user1_action: MatchAction = row
            .user1_action
            .parse()
            .map_err(|e| malformed("match", &row.id, e))?;
        let user2_action: MatchAction = row
            .user2_action
            .parse()
            .map_err(|e| malformed("match", &row.id, e))?;
        let score: MatchScore =
            serde_json::from_str(&row.score).map_err(|e| malformed("match", &row.id, e))?;

        Ok(Self {
            snapshot: Match {
                id: row.id,
                user1_id: row.user1_id,
                user2_id: row.user2_id,
                status,
                user1_action,
                user2_action,
                score,
                created_at: row.created_at,
                updated_at: row.updated_at,
                matched_at: row.matched_at,
            },
            version: row.version,
        })
    }
}
