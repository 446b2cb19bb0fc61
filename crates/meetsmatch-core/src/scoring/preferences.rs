//! Compatibility of a candidate with the requester's stated preferences.

use crate::models::User;

/// Fraction of applicable preference checks the candidate satisfies.
///
/// Up to three checks are evaluated, each only when its data exists:
/// the candidate's age against the requester's `[min_age, max_age]`, the
/// candidate's gender against the requester's allowed genders, and overlap of
/// both users' relationship types. Returns 0 when no check applies.
pub fn preference_score(requester: &User, candidate: &User) -> f64 {
    let prefs = &requester.preferences;
    let mut evaluated = 0u8;
    let mut matched = 0u8;

    if let ((Some(min), Some(max)), Some(age)) = (prefs.age_bounds(), candidate.age) {
        evaluated += 1;
        if (min..=max).contains(&age) {
            matched += 1;
        }
    }

    if !prefs.gender_preference.is_empty() {
        if let Some(gender) = candidate.gender {
            evaluated += 1;
            if prefs.gender_preference.contains(&gender) {
                matched += 1;
            }
        }
    }

    let theirs = &candidate.preferences.relationship_type;
    if !prefs.relationship_type.is_empty() && !theirs.is_empty() {
        evaluated += 1;
        if !prefs.relationship_type.is_disjoint(theirs) {
            matched += 1;
        }
    }

    if evaluated == 0 {
        0.0
    } else {
        f64::from(matched) / f64::from(evaluated)
    }
}
