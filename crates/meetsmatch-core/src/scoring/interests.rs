//! Topical overlap between interest sets.

use std::collections::BTreeSet;

/// Jaccard similarity `|A ∩ B| / |A ∪ B|`, or 0 when either set is empty.
#[allow(clippy::cast_precision_loss)]
pub fn interest_score(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count();
    let union = a.len() + b.len() - common;
    common as f64 / union as f64
}
