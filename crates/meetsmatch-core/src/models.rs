//! Domain model shared by the matching engine and the match lifecycle.
//!
//! Users and their preferences are owned by the account subsystem; this crate
//! only reads them. Matches are owned by the lifecycle.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Gender as recorded on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            other => Err(Error::InvalidValue {
                field: "gender",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized coordinates as returned by the geocoding collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            city: None,
            country: None,
        }
    }
}

/// Matching preferences embedded in a [`User`].
///
/// Every field is optional; an unset field (or an empty set) means the user
/// expressed no constraint for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub gender_preference: BTreeSet<Gender>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub relationship_type: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance_km: Option<u32>,
}

impl Preferences {
    /// Effective `(min_age, max_age)` bounds. A bound of 0 means "not set".
    pub fn age_bounds(&self) -> (Option<i32>, Option<i32>) {
        let set = |age: Option<i32>| age.filter(|&a| a > 0);
        (set(self.min_age), set(self.max_age))
    }

    /// Reject preference combinations that can never be satisfied.
    pub fn validate(&self) -> Result<(), Error> {
        for (field, age) in [("min_age", self.min_age), ("max_age", self.max_age)] {
            if let Some(age) = age {
                if !(0..=150).contains(&age) {
                    return Err(Error::InvalidValue {
                        field,
                        value: age.to_string(),
                    });
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err(Error::InvalidValue {
                    field: "age_range",
                    value: format!("{min}-{max}"),
                });
            }
        }
        if self.max_distance_km == Some(0) {
            return Err(Error::InvalidValue {
                field: "max_distance_km",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Read-only user snapshot consumed by the matching engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_sleeping: bool,
    #[serde(default)]
    pub is_profile_complete: bool,
    #[serde(default)]
    pub last_active: i64,
}

impl User {
    /// Whether this user may receive candidates at all.
    pub const fn is_discoverable(&self) -> bool {
        self.is_active && self.is_profile_complete
    }
}

/// Status of a pairwise match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Matched,
    Rejected,
}

impl MatchStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::Rejected => "rejected",
        }
    }

    /// `matched` and `rejected` have no outgoing transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Matched | Self::Rejected)
    }
}

impl FromStr for MatchStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "matched" => Ok(Self::Matched),
            "rejected" => Ok(Self::Rejected),
            other => Err(Error::InvalidValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant's decision on a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchAction {
    #[default]
    None,
    Like,
    Dislike,
    Skip,
}

impl MatchAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Skip => "skip",
        }
    }
}

impl FromStr for MatchAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "skip" => Ok(Self::Skip),
            other => Err(Error::InvalidValue {
                field: "action",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for MatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compatibility score for an ordered (requester, candidate) pair.
///
/// Every component is in `[0, 1]`. Derived data: it is recomputed on demand
/// and only stored alongside a match for convenience.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub total: f64,
    pub location: f64,
    pub interests: f64,
    pub preferences: f64,
}

/// Which side of a match a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    First,
    Second,
}

/// Snapshot of a persisted match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub status: MatchStatus,
    pub user1_action: MatchAction,
    pub user2_action: MatchAction,
    pub score: MatchScore,
    pub created_at: i64,
    pub updated_at: i64,
    pub matched_at: Option<i64>,
}

impl Match {
    /// Resolve which side `user_id` is on, if any.
    pub fn participant(&self, user_id: &str) -> Option<Participant> {
        if self.user1_id == user_id {
            Some(Participant::First)
        } else if self.user2_id == user_id {
            Some(Participant::Second)
        } else {
            None
        }
    }

    /// The user on the other side of `participant`.
    pub fn counterpart_id(&self, participant: Participant) -> &str {
        match participant {
            Participant::First => &self.user2_id,
            Participant::Second => &self.user1_id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_their_column_names() {
        for status in [MatchStatus::Pending, MatchStatus::Matched, MatchStatus::Rejected] {
            assert_eq!(status.as_str().parse::<MatchStatus>().unwrap(), status);
        }
        for action in [
            MatchAction::None,
            MatchAction::Like,
            MatchAction::Dislike,
            MatchAction::Skip,
        ] {
            assert_eq!(action.as_str().parse::<MatchAction>().unwrap(), action);
        }
        assert!("maybe".parse::<MatchAction>().is_err());
        assert!("unknown".parse::<Gender>().is_err());
    }

    #[test]
    fn preferences_json_matches_stored_shape() {
        let json = r#"{"min_age":21,"max_age":35,"gender_preference":["female"],"max_distance_km":15}"#;
        let prefs: Preferences = serde_json::from_str(json).unwrap();
        assert_eq!(prefs.min_age, Some(21));
        assert!(prefs.gender_preference.contains(&Gender::Female));
        assert!(prefs.relationship_type.is_empty());
        assert_eq!(prefs.max_distance_km, Some(15));
    }

    #[test]
    fn preferences_validation() {
        assert!(Preferences::default().validate().is_ok());

        let inverted = Preferences {
            min_age: Some(40),
            max_age: Some(30),
            ..Preferences::default()
        };
        assert!(inverted.validate().is_err());

        let zero_distance = Preferences {
            max_distance_km: Some(0),
            ..Preferences::default()
        };
        assert!(zero_distance.validate().is_err());
    }

    #[test]
    fn zero_age_bound_is_unset() {
        let prefs = Preferences {
            min_age: Some(0),
            max_age: Some(35),
            ..Preferences::default()
        };
        assert_eq!(prefs.age_bounds(), (None, Some(35)));
        assert_eq!(Preferences::default().age_bounds(), (None, None));
    }

    #[test]
    fn participant_lookup() {
        let m = Match {
            id: "m1".into(),
            user1_id: "alice".into(),
            user2_id: "bob".into(),
            status: MatchStatus::Pending,
            user1_action: MatchAction::None,
            user2_action: MatchAction::None,
            score: MatchScore::default(),
            created_at: 0,
            updated_at: 0,
            matched_at: None,
        };
        assert_eq!(m.participant("alice"), Some(Participant::First));
        assert_eq!(m.participant("bob"), Some(Participant::Second));
        assert_eq!(m.participant("carol"), None);
        assert_eq!(m.counterpart_id(Participant::First), "bob");
    }
}
