//! Lifecycle transitions: start, suspend, resume, complete, fail, cancel.
//!
//! Transitions that involve the coordinator run in three steps:
//!
//! 1. validate under the registry lock (no mutation),
//! 2. await the coordinator with the lock released,
//! 3. re-acquire the lock, re-validate and commit.
//!
//! If the world changed between 1 and 3 (another plan took the last active
//! slot, a dependency was cancelled, ...) the commit fails and the plan is
//! left where it was. A start or resume that fails this way is followed by
//! `notify_plan_start_aborted`.

use futures::future::join_all;

use crate::error::{PlanError, Result};
use crate::models::PlanStatus;
use crate::state::PlanAction;

use super::BuildPlanManager;

impl BuildPlanManager {
    /// Move a `created` or `suspended` plan to `active`.
    ///
    /// Fails if a dependency is not active or completed, or if the
    /// active-plan limit is reached.
    pub async fn start(&self, plan_id: &str) -> Result<()> {
        self.activate(plan_id, PlanAction::Start).await
    }

    /// Move a `suspended` plan back to `active`. Same checks as [`Self::start`].
    pub async fn resume(&self, plan_id: &str) -> Result<()> {
        self.activate(plan_id, PlanAction::Resume).await
    }

    /// Move an `active` plan to `suspended`. Agent reservations are kept.
    pub async fn suspend(&self, plan_id: &str) -> Result<()> {
        self.check(plan_id, PlanAction::Suspend)?;

        self.coordinator
            .notify_plan_suspended(plan_id)
            .await
            .map_err(|e| self.coordinator_failure(plan_id, PlanAction::Suspend, e))?;

        self.commit(plan_id, PlanAction::Suspend)
    }

    /// Move an `active` plan to `completed`.
    ///
    /// Like [`Self::fail`], this keeps the plan's agent reservations until
    /// they are released with [`Self::release_agent`]. Only `cancel`
    /// releases them automatically.
    pub fn complete(&self, plan_id: &str) -> Result<()> {
        self.commit(plan_id, PlanAction::Complete)
    }

    /// Move an `active` plan to `failed`.
    pub fn fail(&self, plan_id: &str) -> Result<()> {
        self.commit(plan_id, PlanAction::Fail)
    }

    /// Cancel a non-terminal plan and release all of its reservations.
    ///
    /// The status change is committed immediately. Reservations are dropped
    /// from the table in the same critical section and then released at the
    /// coordinator; a coordinator failure there is logged but does not undo
    /// the cancellation.
    pub async fn cancel(&self, plan_id: &str) -> Result<()> {
        let released = {
            let mut reg = self.registry();
            let previous = reg
                .apply_transition(plan_id, PlanAction::Cancel, None)
                .inspect_err(|e| tracing::warn!(plan_id, error = %e, "cancel rejected"))?;
            tracing::info!(plan_id, from = %previous, "plan cancelled");
            reg.reservations.remove_plan(plan_id)
        };

        let releases = released
            .iter()
            .map(|r| self.coordinator.release(&r.agent_name, plan_id));
        for (reservation, outcome) in released.iter().zip(join_all(releases).await) {
            match outcome {
                Ok(()) => tracing::info!(
                    plan_id,
                    agent = %reservation.agent_name,
                    "reservation released on cancel"
                ),
                Err(e) => tracing::warn!(
                    plan_id,
                    agent = %reservation.agent_name,
                    error = %e,
                    "coordinator failed to release agent on cancel"
                ),
            }
        }

        Ok(())
    }

    async fn activate(&self, plan_id: &str, action: PlanAction) -> Result<()> {
        self.check(plan_id, action)?;

        self.coordinator
            .notify_plan_started(plan_id)
            .await
            .map_err(|e| self.coordinator_failure(plan_id, action, e))?;

        // The coordinator was told the plan started; take that back if the
        // commit lost a race.
        if let Err(e) = self.commit(plan_id, action) {
            if let Err(abort_err) = self.coordinator.notify_plan_start_aborted(plan_id).await {
                tracing::warn!(
                    plan_id,
                    %action,
                    error = %abort_err,
                    "coordinator failed to acknowledge aborted start"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Validate `action` without mutating anything.
    fn check(&self, plan_id: &str, action: PlanAction) -> Result<PlanStatus> {
        self.registry()
            .check_transition(plan_id, action, self.config.max_active_plans)
            .inspect_err(|e| tracing::warn!(plan_id, %action, error = %e, "transition rejected"))
    }

    /// Re-validate and apply `action` in one critical section.
    fn commit(&self, plan_id: &str, action: PlanAction) -> Result<()> {
        let mut reg = self.registry();
        let previous = reg
            .apply_transition(plan_id, action, self.config.max_active_plans)
            .inspect_err(|e| tracing::warn!(plan_id, %action, error = %e, "transition rejected"))?;
        let current = reg.get(plan_id)?.status;
        tracing::info!(plan_id, %action, from = %previous, to = %current, "plan transitioned");
        Ok(())
    }

    fn coordinator_failure(
        &self,
        plan_id: &str,
        action: PlanAction,
        error: anyhow::Error,
    ) -> PlanError {
        tracing::warn!(
            plan_id,
            %action,
            coordinator = self.coordinator.name(),
            error = %error,
            "coordinator failed, plan left unchanged"
        );
        PlanError::Coordinator(error)
    }
}
