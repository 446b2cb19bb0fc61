//! Match lifecycle transition rules.
//!
//! ```text
//! pending --like (other side already liked)--> matched
//! pending --dislike (either side)-----------> rejected
//! pending --skip / like------------------------> pending
//! ```
//!
//! `matched` and `rejected` are terminal. An action always overwrites the
//! acting participant's previous action, even on a terminal match.

use crate::models::{MatchAction, MatchStatus, Participant};

/// Next status given the current status, the action just taken, and the
/// other participant's already committed action.
pub const fn next_status(
    current: MatchStatus,
    action: MatchAction,
    counterpart: MatchAction,
) -> MatchStatus {
    if current.is_terminal() {
        return current;
    }
    match (action, counterpart) {
        (MatchAction::Like, MatchAction::Like) => MatchStatus::Matched,
        (MatchAction::Dislike, _) => MatchStatus::Rejected,
        _ => current,
    }
}

/// Per-row state the lifecycle reads before deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionState {
    pub status: MatchStatus,
    pub user1_action: MatchAction,
    pub user2_action: MatchAction,
}

/// Outcome of applying one participant's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: ActionState,
    /// The match went `pending -> matched` on this action.
    pub became_matched: bool,
    /// Both sides have liked and the match is `matched`.
    pub is_mutual: bool,
}

/// Apply `action` by `who` to `state`.
pub const fn apply_action(state: ActionState, who: Participant, action: MatchAction) -> Transition {
    let counterpart = match who {
        Participant::First => state.user2_action,
        Participant::Second => state.user1_action,
    };
    let status = next_status(state.status, action, counterpart);
    let (user1_action, user2_action) = match who {
        Participant::First => (action, state.user2_action),
        Participant::Second => (state.user1_action, action),
    };

    let is_matched = matches!(status, MatchStatus::Matched);
    Transition {
        state: ActionState {
            status,
            user1_action,
            user2_action,
        },
        became_matched: is_matched && !matches!(state.status, MatchStatus::Matched),
        is_mutual: is_matched
            && matches!(action, MatchAction::Like)
            && matches!(counterpart, MatchAction::Like),
    }
}
