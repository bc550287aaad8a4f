//! Agent reservation and goal dispatch.

use crate::error::{PlanError, Result};
use crate::models::{AgentReservation, GoalResult, PlanStatus};

use super::BuildPlanManager;
use super::registry::Registry;

/// Check that `plan_id` may hold `agent` in the requested mode.
fn check_reservation(reg: &Registry, plan_id: &str, agent: &str, exclusive: bool) -> Result<()> {
    let plan = reg.get(plan_id)?;
    if plan.status.is_terminal() {
        return Err(PlanError::PlanFinished {
            plan_id: plan_id.to_owned(),
            status: plan.status,
        });
    }

    reg.reservations
        .check(agent, plan_id, exclusive)
        .map_err(|conflict| PlanError::ReservationConflict {
            agent: agent.to_owned(),
            holder: conflict.holder,
        })
}

impl BuildPlanManager {
    /// Reserve `agent` for `plan_id`.
    ///
    /// An exclusive reservation fails if any other plan holds the agent; a
    /// shared one fails if another plan holds it exclusively. The
    /// coordinator must also accept the reservation. Re-reserving an agent
    /// the plan already holds replaces the entry.
    pub async fn reserve_agent(
        &self,
        plan_id: &str,
        agent: &str,
        exclusive: bool,
    ) -> Result<AgentReservation> {
        {
            let reg = self.registry();
            check_reservation(&reg, plan_id, agent, exclusive).inspect_err(
                |e| tracing::warn!(plan_id, agent, exclusive, error = %e, "reservation rejected"),
            )?;
        }

        match self.coordinator.reserve(agent, plan_id, exclusive).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(plan_id, agent, "coordinator refused reservation");
                return Err(PlanError::CoordinatorRefused {
                    operation: "reserve",
                    agent: agent.to_owned(),
                    plan_id: plan_id.to_owned(),
                });
            }
            Err(e) => {
                tracing::warn!(plan_id, agent, error = %e, "coordinator failed to reserve");
                return Err(PlanError::Coordinator(e));
            }
        }

        // On failure, also report whether the plan still holds the agent
        // from an earlier reservation, read under the same lock.
        let committed = {
            let mut reg = self.registry();
            match check_reservation(&reg, plan_id, agent, exclusive) {
                Ok(()) => Ok(reg.reservations.insert(agent, plan_id, exclusive)),
                Err(e) => Err((e, reg.reservations.get(agent, plan_id).is_some())),
            }
        };

        match committed {
            Ok(reservation) => {
                tracing::info!(plan_id, agent, exclusive, "agent reserved");
                Ok(reservation)
            }
            Err((e, still_held)) => {
                tracing::warn!(plan_id, agent, error = %e, "reservation lost while awaiting coordinator");
                if !still_held {
                    if let Err(release_err) = self.coordinator.release(agent, plan_id).await {
                        tracing::warn!(
                            plan_id,
                            agent,
                            error = %release_err,
                            "failed to roll back coordinator reservation"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Release `agent` from `plan_id`. Idempotent: returns `Ok(false)` if
    /// the plan held no reservation on the agent.
    pub async fn release_agent(&self, plan_id: &str, agent: &str) -> Result<bool> {
        {
            let reg = self.registry();
            reg.get(plan_id)?;
            if reg.reservations.get(agent, plan_id).is_none() {
                tracing::debug!(plan_id, agent, "nothing to release");
                return Ok(false);
            }
        }

        self.coordinator
            .release(agent, plan_id)
            .await
            .map_err(|e| {
                tracing::warn!(plan_id, agent, error = %e, "coordinator failed to release");
                PlanError::Coordinator(e)
            })?;

        let removed = self.registry().reservations.remove(agent, plan_id).is_some();
        tracing::info!(plan_id, agent, "agent released");
        Ok(removed)
    }

    /// Forward the plan's goal at `goal_index` to `agent` via the
    /// coordinator. The plan must be active and hold a reservation on the
    /// agent.
    pub async fn dispatch_goal(
        &self,
        plan_id: &str,
        agent: &str,
        goal_index: usize,
    ) -> Result<GoalResult> {
        let goal = {
            let reg = self.registry();
            let plan = reg.get(plan_id)?;
            if plan.status != PlanStatus::Active {
                return Err(PlanError::PlanNotActive {
                    plan_id: plan_id.to_owned(),
                    status: plan.status,
                });
            }
            let goal = plan
                .goals
                .get(goal_index)
                .cloned()
                .ok_or_else(|| PlanError::GoalNotFound {
                    plan_id: plan_id.to_owned(),
                    index: goal_index,
                })?;
            if reg.reservations.get(agent, plan_id).is_none() {
                return Err(PlanError::AgentNotReserved {
                    plan_id: plan_id.to_owned(),
                    agent: agent.to_owned(),
                });
            }
            goal
        };

        let result = self
            .coordinator
            .dispatch_goal(agent, plan_id, &goal)
            .await
            .map_err(|e| {
                tracing::warn!(plan_id, agent, error = %e, "goal dispatch failed");
                PlanError::Coordinator(e)
            })?;

        tracing::info!(
            plan_id,
            agent,
            goal_index,
            success = result.success,
            "goal dispatched"
        );
        Ok(result)
    }
}
