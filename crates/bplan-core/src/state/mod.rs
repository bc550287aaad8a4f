//! Plan lifecycle state machine.
//!
//! The transition table lives in exactly one place,
//! [`PlanStateMachine::next_status`]. Everything else, including
//! [`PlanStateMachine::is_valid_transition`] and the manager's guards,
//! is derived from it.

use std::fmt;

use crate::models::PlanStatus;

/// An operation that moves a plan through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Start,
    Suspend,
    Resume,
    Complete,
    Fail,
    Cancel,
}

impl PlanAction {
    pub const ALL: [PlanAction; 6] = [
        Self::Start,
        Self::Suspend,
        Self::Resume,
        Self::Complete,
        Self::Fail,
        Self::Cancel,
    ];

    /// Whether taking this action requires the dependency and active-limit
    /// checks before it may commit.
    pub fn activates(self) -> bool {
        matches!(self, Self::Start | Self::Resume)
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
        };
        f.pad(s)
    }
}

/// The plan state machine.
///
/// ```text
/// created   -> active     (start)
/// suspended -> active     (start, resume)
/// active    -> suspended  (suspend)
/// active    -> completed  (complete)
/// active    -> failed     (fail)
/// created | active | suspended -> cancelled (cancel)
/// ```
///
/// `completed`, `failed` and `cancelled` are terminal.
pub struct PlanStateMachine;

impl PlanStateMachine {
    /// The status a plan in `from` moves to when `action` is applied, or
    /// `None` if the action is not permitted from that status.
    pub fn next_status(from: PlanStatus, action: PlanAction) -> Option<PlanStatus> {
        use PlanAction as A;
        use PlanStatus as S;

        match (from, action) {
            (S::Created | S::Suspended, A::Start) => Some(S::Active),
            (S::Suspended, A::Resume) => Some(S::Active),
            (S::Active, A::Suspend) => Some(S::Suspended),
            (S::Active, A::Complete) => Some(S::Completed),
            (S::Active, A::Fail) => Some(S::Failed),
            (S::Created | S::Active | S::Suspended, A::Cancel) => Some(S::Cancelled),
            _ => None,
        }
    }

    /// Check whether `from -> to` is an edge of the state graph.
    pub fn is_valid_transition(from: PlanStatus, to: PlanStatus) -> bool {
        PlanAction::ALL
            .into_iter()
            .any(|action| Self::next_status(from, action) == Some(to))
    }
}
