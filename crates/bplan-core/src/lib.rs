//! In-process build plan manager.
//!
//! Tracks plans (units of coordinated work) through their lifecycle, keeps
//! their dependency graph acyclic, and records which agents each plan has
//! reserved. Anything that touches a live agent goes through an
//! [`AgentCoordinator`].

pub mod coordinator;
pub mod error;
pub mod export;
pub mod graph;
pub mod manager;
pub mod models;
pub mod reservation;
pub mod state;

pub use coordinator::{AgentCoordinator, CoordinatorRegistry, LocalCoordinator};
pub use error::{ErrorKind, PlanError};
pub use export::ExportDocument;
pub use manager::{BuildPlanManager, ManagerConfig, NewPlan};
pub use models::{
    AgentReservation, AgentWorkload, Goal, GoalResult, PlanPriority, PlanSnapshot, PlanStatus,
    PlanSummary,
};
pub use state::{PlanAction, PlanStateMachine};
