//! The `AgentCoordinator` trait: the seam between plan bookkeeping and
//! whatever actually runs agents.
//!
//! The trait is object-safe so the manager can hold an
//! `Arc<dyn AgentCoordinator>` chosen at runtime.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Goal, GoalResult};

/// Collaborator that owns live agents.
///
/// A returned `Ok(false)` from [`AgentCoordinator::reserve`] is a refusal;
/// an `Err` is a failure of the coordinator itself. The manager treats both
/// as collaborator failures and leaves its own state unchanged.
#[async_trait]
pub trait AgentCoordinator: Send + Sync {
    /// Human-readable name (e.g. "local").
    fn name(&self) -> &str;

    /// Ask the coordinator to hold `agent` for `plan_id`.
    async fn reserve(&self, agent: &str, plan_id: &str, exclusive: bool) -> Result<bool>;

    /// Release a hold. Must tolerate releasing something never reserved.
    async fn release(&self, agent: &str, plan_id: &str) -> Result<()>;

    /// Called once a start or resume has been validated, before the plan
    /// becomes active. An error aborts the transition.
    async fn notify_plan_started(&self, plan_id: &str) -> Result<()>;

    /// Called before a plan is suspended.
    async fn notify_plan_suspended(&self, _plan_id: &str) -> Result<()> {
        Ok(())
    }

    /// Called when a start or resume already announced through
    /// [`AgentCoordinator::notify_plan_started`] failed to commit. The plan
    /// kept its previous status.
    async fn notify_plan_start_aborted(&self, _plan_id: &str) -> Result<()> {
        Ok(())
    }

    /// Hand a goal to an agent the plan has reserved.
    async fn dispatch_goal(&self, agent: &str, plan_id: &str, goal: &Goal) -> Result<GoalResult>;
}

// Compile-time assertion: AgentCoordinator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn AgentCoordinator) {}
};
