//! The build plan manager: plan registry, dependency graph, agent
//! reservations and lifecycle transitions behind a single owner.
//!
//! All state lives in one [`Registry`] behind a `std::sync::Mutex`. The
//! lock is never held across an `.await`: coordinator-facing operations
//! validate under the lock, release it to await the coordinator, then
//! re-acquire it to re-validate and commit (see [`lifecycle`] and
//! [`agents`]).

mod agents;
mod lifecycle;
mod registry;

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::coordinator::AgentCoordinator;
use crate::error::Result;
use crate::export::ExportDocument;
use crate::models::{
    AgentWorkload, Goal, PlanPriority, PlanSnapshot, PlanStatus, PlanSummary,
};

use registry::Registry;

/// Tunables for a [`BuildPlanManager`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Maximum number of simultaneously active plans. `None` means no limit.
    pub max_active_plans: Option<usize>,
}

impl ManagerConfig {
    pub fn with_max_active_plans(mut self, limit: usize) -> Self {
        self.max_active_plans = Some(limit);
        self
    }
}

/// Arguments for [`BuildPlanManager::create_plan`].
#[derive(Debug, Clone, Default)]
pub struct NewPlan {
    pub name: String,
    pub description: String,
    pub priority: PlanPriority,
    pub parent_plan_id: Option<String>,
    pub workspace_path: Option<PathBuf>,
    pub tags: BTreeSet<String>,
}

impl NewPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: PlanPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn parent(mut self, parent_plan_id: impl Into<String>) -> Self {
        self.parent_plan_id = Some(parent_plan_id.into());
        self
    }

    pub fn workspace(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace_path = Some(path.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Owner of all plan and reservation state.
///
/// Construct one per process and share it by reference (or `Arc`). No
/// other component may mutate plan or reservation state.
pub struct BuildPlanManager {
    coordinator: Arc<dyn AgentCoordinator>,
    config: ManagerConfig,
    registry: Mutex<Registry>,
}

impl BuildPlanManager {
    pub fn new(coordinator: Arc<dyn AgentCoordinator>, config: ManagerConfig) -> Self {
        Self {
            coordinator,
            config,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<dyn AgentCoordinator> {
        &self.coordinator
    }

    /// Lock the registry. Mutations validate before they write, so a
    /// poisoned lock still guards a consistent registry.
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------
    // Registry operations
    // -------------------------------------------------------------------

    /// Create a plan in `created` status. Fails if the parent is unknown.
    pub fn create_plan(&self, new: NewPlan) -> Result<PlanSnapshot> {
        let mut reg = self.registry();
        let plan = reg.insert(new)?;
        tracing::info!(
            plan_id = %plan.id,
            name = %plan.name,
            priority = %plan.priority,
            parent = plan.parent_plan_id.as_deref().unwrap_or("-"),
            "plan created"
        );
        let plan = plan.clone();
        Ok(reg.snapshot(&plan))
    }

    /// Append a goal to a plan. Returns the goal's index.
    pub fn add_goal_to_plan(&self, plan_id: &str, goal: Goal) -> Result<usize> {
        let index = self.registry().push_goal(plan_id, goal)?;
        tracing::info!(plan_id, index, "goal added");
        Ok(index)
    }

    /// Add the edge `plan_id -> depends_on`. Returns `false` if the edge
    /// already existed. Cycles are rejected and leave the graph unchanged.
    pub fn add_dependency(&self, plan_id: &str, depends_on: &str) -> Result<bool> {
        let result = self.registry().add_dependency(plan_id, depends_on);
        match &result {
            Ok(inserted) => tracing::info!(plan_id, depends_on, inserted, "dependency added"),
            Err(e) => tracing::warn!(plan_id, depends_on, error = %e, "dependency rejected"),
        }
        result
    }

    /// Snapshot of one plan, or `None` if it does not exist.
    pub fn get_plan_status(&self, plan_id: &str) -> Option<PlanSnapshot> {
        let reg = self.registry();
        reg.get(plan_id).ok().map(|plan| reg.snapshot(plan))
    }

    /// Snapshots of all plans in creation order, optionally filtered.
    pub fn list_plans(&self, status_filter: Option<PlanStatus>) -> Vec<PlanSnapshot> {
        let reg = self.registry();
        reg.iter()
            .filter(|p| status_filter.is_none_or(|s| p.status == s))
            .map(|p| reg.snapshot(p))
            .collect()
    }

    /// Per-agent aggregation of current reservations.
    pub fn get_agent_workload(&self) -> BTreeMap<String, AgentWorkload> {
        self.registry().reservations.workload()
    }

    /// Counts of plans per status.
    pub fn status_summary(&self) -> PlanSummary {
        let reg = self.registry();
        let mut summary = PlanSummary::default();
        for plan in reg.iter() {
            summary.record(plan.status);
        }
        summary
    }

    /// Created plans whose dependencies are all satisfied, highest priority
    /// first, then creation order. Advisory only; nothing is started.
    pub fn ready_plans(&self) -> Vec<PlanSnapshot> {
        let reg = self.registry();
        let mut ready: Vec<_> = reg
            .iter()
            .filter(|p| p.status == PlanStatus::Created)
            .filter(|p| reg.check_dependencies(&p.id).is_ok())
            .collect();
        ready.sort_by_key(|p| (Reverse(p.priority), p.seq));
        ready.into_iter().map(|p| reg.snapshot(p)).collect()
    }

    /// Every plan id in dependency order (dependencies first). Plans that
    /// become orderable together are ranked by priority, then creation.
    pub fn execution_order(&self) -> Vec<String> {
        let reg = self.registry();
        reg.graph.topological_order(|id| {
            reg.get(id)
                .map(|p| (Reverse(p.priority), p.seq))
                .unwrap_or((Reverse(PlanPriority::Low), usize::MAX))
        })
    }

    /// Point-in-time copy of all plans and agent workload.
    pub fn export(&self) -> ExportDocument {
        let reg = self.registry();
        ExportDocument::new(
            reg.iter().map(|p| reg.snapshot(p)).collect(),
            reg.reservations.workload(),
        )
    }
}

impl std::fmt::Debug for BuildPlanManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reg = self.registry();
        f.debug_struct("BuildPlanManager")
            .field("coordinator", &self.coordinator.name())
            .field("config", &self.config)
            .field("plans", &reg.len())
            .finish()
    }
}
