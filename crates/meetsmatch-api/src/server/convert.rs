//! Domain to wire conversions for `MatchService` responses.

use meetsmatch_core::models::{
    Gender, Location, Match, MatchAction, MatchScore, MatchStatus, Preferences, User,
};
use meetsmatch_proto::v1 as pb;

use crate::engine::ScoredCandidate;

fn timestamp(seconds: i64) -> prost_types::Timestamp {
    prost_types::Timestamp { seconds, nanos: 0 }
}

const fn gender_to_proto(gender: Gender) -> pb::Gender {
    match gender {
        Gender::Male => pb::Gender::Male,
        Gender::Female => pb::Gender::Female,
        Gender::Other => pb::Gender::Other,
    }
}

pub const fn status_to_proto(status: MatchStatus) -> pb::MatchStatus {
    match status {
        MatchStatus::Pending => pb::MatchStatus::Pending,
        MatchStatus::Matched => pb::MatchStatus::Matched,
        MatchStatus::Rejected => pb::MatchStatus::Rejected,
    }
}

pub const fn action_to_proto(action: MatchAction) -> pb::MatchAction {
    match action {
        MatchAction::None => pb::MatchAction::None,
        MatchAction::Like => pb::MatchAction::Like,
        MatchAction::Dislike => pb::MatchAction::Dislike,
        MatchAction::Skip => pb::MatchAction::Skip,
    }
}

fn location_to_proto(loc: &Location) -> pb::Location {
    pb::Location {
        latitude: loc.latitude,
        longitude: loc.longitude,
        city: loc.city.clone().unwrap_or_default(),
        country: loc.country.clone().unwrap_or_default(),
    }
}

fn preferences_to_proto(prefs: &Preferences) -> pb::Preferences {
    pb::Preferences {
        min_age: prefs.min_age,
        max_age: prefs.max_age,
        gender_preference: prefs
            .gender_preference
            .iter()
            .map(|g| gender_to_proto(*g) as i32)
            .collect(),
        relationship_type: prefs.relationship_type.iter().cloned().collect(),
        max_distance_km: prefs
            .max_distance_km
            .map(|km| i32::try_from(km).unwrap_or(i32::MAX)),
    }
}

pub fn user_to_proto(user: &User) -> pb::User {
    pb::User {
        id: user.id.clone(),
        username: user.username.clone().unwrap_or_default(),
        first_name: user.first_name.clone(),
        age: user.age,
        gender: user
            .gender
            .map_or(pb::Gender::Unspecified, gender_to_proto) as i32,
        interests: user.interests.iter().cloned().collect(),
        location: user.location.as_ref().map(location_to_proto),
        preferences: Some(preferences_to_proto(&user.preferences)),
        is_active: user.is_active,
        is_profile_complete: user.is_profile_complete,
    }
}

pub const fn score_to_proto(score: &MatchScore) -> pb::MatchScore {
    pb::MatchScore {
        total: score.total,
        location: score.location,
        interests: score.interests,
        preferences: score.preferences,
    }
}

pub fn match_to_proto(m: &Match) -> pb::Match {
    pb::Match {
        id: m.id.clone(),
        user1_id: m.user1_id.clone(),
        user2_id: m.user2_id.clone(),
        status: status_to_proto(m.status) as i32,
        score: Some(score_to_proto(&m.score)),
        user1_action: action_to_proto(m.user1_action) as i32,
        user2_action: action_to_proto(m.user2_action) as i32,
        created_at: Some(timestamp(m.created_at)),
        updated_at: Some(timestamp(m.updated_at)),
        matched_at: m.matched_at.map(timestamp),
    }
}

/// Split ranked candidates into the parallel user/score lists of the response.
pub fn candidates_to_proto(ranked: &[ScoredCandidate]) -> pb::GetPotentialMatchesResponse {
    let (potential_matches, scores) = ranked
        .iter()
        .map(|c| (user_to_proto(&c.user), score_to_proto(&c.score)))
        .unzip();
    pb::GetPotentialMatchesResponse {
        potential_matches,
        scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn user_fields_map_to_wire() {
        let user = User {
            id: "u1".into(),
            first_name: "Ana".into(),
            age: Some(29),
            gender: Some(Gender::Female),
            interests: BTreeSet::from(["chess".to_string()]),
            location: Some(Location::new(1.5, 2.5)),
            preferences: Preferences {
                gender_preference: BTreeSet::from([Gender::Male]),
                max_distance_km: Some(30),
                ..Preferences::default()
            },
            is_active: true,
            is_profile_complete: true,
            ..User::default()
        };

        let wire = user_to_proto(&user);
        assert_eq!(wire.username, "");
        assert_eq!(wire.gender, pb::Gender::Female as i32);
        assert_eq!(wire.interests, vec!["chess".to_string()]);
        let loc = wire.location.as_ref().map(|l| (l.latitude, l.longitude));
        assert_eq!(loc, Some((1.5, 2.5)));
        let prefs = wire.preferences.unwrap_or_default();
        assert_eq!(prefs.gender_preference, vec![pb::Gender::Male as i32]);
        assert_eq!(prefs.max_distance_km, Some(30));
        assert_eq!(prefs.min_age, None);
    }

    #[test]
    fn unmatched_match_has_no_matched_at() {
        let m = Match {
            id: "m1".into(),
            user1_id: "a".into(),
            user2_id: "b".into(),
            status: MatchStatus::Pending,
            user1_action: MatchAction::Like,
            user2_action: MatchAction::None,
            score: MatchScore {
                total: 0.5,
                ..MatchScore::default()
            },
            created_at: 100,
            updated_at: 200,
            matched_at: None,
        };
        let wire = match_to_proto(&m);
        assert_eq!(wire.status, pb::MatchStatus::Pending as i32);
        assert_eq!(wire.user1_action, pb::MatchAction::Like as i32);
        assert_eq!(wire.user2_action, pb::MatchAction::None as i32);
        assert_eq!(wire.updated_at.map(|t| t.seconds), Some(200));
        assert!(wire.matched_at.is_none());
        assert_eq!(wire.score.map(|s| s.total), Some(0.5));
    }
}
