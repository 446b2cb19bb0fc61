//! Candidate scoring.
//!
//! Combines three normalized sub-scores into a single weighted total:
//!
//! | Component   | Weight |
//! |-------------|--------|
//! | Location    | 0.3    |
//! | Interests   | 0.4    |
//! | Preferences | 0.3    |
//!
//! All functions here are pure and deterministic.

mod geo;
mod interests;
mod preferences;

pub use geo::{EARTH_RADIUS_KM, geo_score, haversine_km};
pub use interests::interest_score;
pub use preferences::preference_score;

use crate::models::{MatchScore, User};

pub const LOCATION_WEIGHT: f64 = 0.3;
pub const INTERESTS_WEIGHT: f64 = 0.4;
pub const PREFERENCES_WEIGHT: f64 = 0.3;

/// Soft max distance used for the location score when the requester has not
/// set one.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 20.0;

/// Scores (requester, candidate) pairs.
#[derive(Debug, Clone, Copy)]
pub struct CandidateScorer {
    default_max_distance_km: f64,
}

impl Default for CandidateScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DISTANCE_KM)
    }
}

impl CandidateScorer {
    pub const fn new(default_max_distance_km: f64) -> Self {
        Self {
            default_max_distance_km,
        }
    }

    /// Compute the full score of `candidate` from `requester`'s point of view.
    pub fn score(&self, requester: &User, candidate: &User) -> MatchScore {
        let location = match (&requester.location, &candidate.location) {
            (Some(a), Some(b)) => {
                let max = requester
                    .preferences
                    .max_distance_km
                    .map_or(self.default_max_distance_km, f64::from);
                geo_score(a, b, max)
            }
            _ => 0.0,
        };
        let interests = interest_score(&requester.interests, &candidate.interests);
        let preferences = preference_score(requester, candidate);

        MatchScore {
            total: weighted_total(location, interests, preferences),
            location,
            interests,
            preferences,
        }
    }

    /// Hard distance filter used by discovery.
    ///
    /// Only applies when both users have coordinates and the requester set a
    /// max distance; otherwise every candidate passes.
    pub fn within_max_distance(requester: &User, candidate: &User) -> bool {
        match (
            &requester.location,
            &candidate.location,
            requester.preferences.max_distance_km,
        ) {
            (Some(a), Some(b), Some(max)) => haversine_km(a, b) <= f64::from(max),
            _ => true,
        }
    }
}

/// `0.3·location + 0.4·interests + 0.3·preferences`, capped at 1.
pub fn weighted_total(location: f64, interests: f64, preferences: f64) -> f64 {
    (location * LOCATION_WEIGHT + interests * INTERESTS_WEIGHT + preferences * PREFERENCES_WEIGHT)
        .min(1.0)
}
