//! Error type shared by every manager operation.
//!
//! Operations never panic and never unwind on expected failures: they return
//! `Result<_, PlanError>` (or `Option` for lookups) and callers branch on
//! the value. [`PlanError::kind`] collapses the variants into the three
//! categories callers usually care about.

use crate::models::PlanStatus;
use crate::state::PlanAction;

/// Coarse classification of a [`PlanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An unknown plan, goal, or agent reference.
    NotFound,
    /// The operation would break a registry invariant.
    InvariantViolation,
    /// The agent coordinator refused or failed.
    CollaboratorFailure,
}

/// Errors returned by [`crate::BuildPlanManager`] operations.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("plan {0} not found")]
    PlanNotFound(String),

    #[error("parent plan {0} not found")]
    ParentNotFound(String),

    #[error("plan {plan_id} has no goal at index {index}")]
    GoalNotFound { plan_id: String, index: usize },

    #[error("agent {agent} is not reserved by plan {plan_id}")]
    AgentNotReserved { plan_id: String, agent: String },

    #[error("cannot {action} plan {plan_id}: status is {status}")]
    InvalidTransition {
        plan_id: String,
        action: PlanAction,
        status: PlanStatus,
    },

    #[error("adding dependency {plan_id} -> {depends_on} would create a cycle")]
    DependencyCycle { plan_id: String, depends_on: String },

    #[error("dependency {dependency} of plan {plan_id} has status {status}")]
    DependencyNotSatisfied {
        plan_id: String,
        dependency: String,
        status: PlanStatus,
    },

    #[error("cannot activate plan {plan_id}: {limit} plan(s) already active")]
    ActiveLimitReached { plan_id: String, limit: usize },

    #[error("agent {agent} is already reserved by plan {holder}")]
    ReservationConflict { agent: String, holder: String },

    #[error("plan {plan_id} is {status} and cannot take new reservations")]
    PlanFinished { plan_id: String, status: PlanStatus },

    #[error("plan {plan_id} is {status}; goals can only be dispatched while active")]
    PlanNotActive { plan_id: String, status: PlanStatus },

    #[error("coordinator refused to {operation} agent {agent} for plan {plan_id}")]
    CoordinatorRefused {
        operation: &'static str,
        agent: String,
        plan_id: String,
    },

    #[error("coordinator error: {0:#}")]
    Coordinator(anyhow::Error),
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PlanNotFound(_)
            | Self::ParentNotFound(_)
            | Self::GoalNotFound { .. }
            | Self::AgentNotReserved { .. } => ErrorKind::NotFound,
            Self::InvalidTransition { .. }
            | Self::DependencyCycle { .. }
            | Self::DependencyNotSatisfied { .. }
            | Self::ActiveLimitReached { .. }
            | Self::ReservationConflict { .. }
            | Self::PlanFinished { .. }
            | Self::PlanNotActive { .. } => ErrorKind::InvariantViolation,
            Self::CoordinatorRefused { .. } | Self::Coordinator(_) => {
                ErrorKind::CollaboratorFailure
            }
        }
    }
}

pub type Result<T, E = PlanError> = std::result::Result<T, E>;
