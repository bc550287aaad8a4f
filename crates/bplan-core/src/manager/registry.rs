//! The state owned by a [`super::BuildPlanManager`], guarded by its mutex.
//!
//! Everything here is synchronous. Each public manager operation takes the
//! lock, calls one or more of these methods, and releases it before any
//! coordinator call is awaited.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{PlanError, Result};
use crate::graph::DependencyGraph;
use crate::models::{Goal, PlanPriority, PlanSnapshot, PlanStatus};
use crate::reservation::ReservationTable;
use crate::state::{PlanAction, PlanStateMachine};

use super::NewPlan;

/// A plan as stored in the registry. Dependencies and reservations live in
/// the graph and the reservation table respectively.
#[derive(Debug, Clone)]
pub(crate) struct PlanRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub priority: PlanPriority,
    pub status: PlanStatus,
    pub parent_plan_id: Option<String>,
    pub child_plan_ids: BTreeSet<String>,
    pub workspace_path: Option<PathBuf>,
    pub tags: BTreeSet<String>,
    pub goals: Vec<Goal>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation sequence number, used for stable ordering.
    pub seq: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    plans: HashMap<String, PlanRecord>,
    /// Plan ids in creation order.
    order: Vec<String>,
    pub graph: DependencyGraph,
    pub reservations: ReservationTable,
}

impl Registry {
    pub fn get(&self, plan_id: &str) -> Result<&PlanRecord> {
        self.plans
            .get(plan_id)
            .ok_or_else(|| PlanError::PlanNotFound(plan_id.to_owned()))
    }

    fn get_mut(&mut self, plan_id: &str) -> Result<&mut PlanRecord> {
        self.plans
            .get_mut(plan_id)
            .ok_or_else(|| PlanError::PlanNotFound(plan_id.to_owned()))
    }

    pub fn contains(&self, plan_id: &str) -> bool {
        self.plans.contains_key(plan_id)
    }

    /// Plans in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &PlanRecord> {
        self.order.iter().filter_map(|id| self.plans.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    // -------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------

    pub fn insert(&mut self, new: NewPlan) -> Result<&PlanRecord> {
        if let Some(parent) = &new.parent_plan_id {
            if !self.contains(parent) {
                return Err(PlanError::ParentNotFound(parent.clone()));
            }
        }

        let id = self.fresh_id();
        let record = PlanRecord {
            id: id.clone(),
            name: new.name,
            description: new.description,
            priority: new.priority,
            status: PlanStatus::Created,
            parent_plan_id: new.parent_plan_id,
            child_plan_ids: BTreeSet::new(),
            workspace_path: new.workspace_path,
            tags: new.tags,
            goals: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            seq: self.order.len(),
        };

        if let Some(parent) = &record.parent_plan_id {
            self.get_mut(parent)?.child_plan_ids.insert(id.clone());
        }
        self.graph.add_node(&id);
        self.order.push(id.clone());
        Ok(&*self.plans.entry(id).or_insert(record))
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.plans.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn push_goal(&mut self, plan_id: &str, goal: Goal) -> Result<usize> {
        let plan = self.get_mut(plan_id)?;
        plan.goals.push(goal);
        Ok(plan.goals.len() - 1)
    }

    // -------------------------------------------------------------------
    // Dependencies
    // -------------------------------------------------------------------

    /// Insert `plan_id -> depends_on`. Nothing is mutated on error.
    pub fn add_dependency(&mut self, plan_id: &str, depends_on: &str) -> Result<bool> {
        self.get(plan_id)?;
        self.get(depends_on)?;

        if self.graph.would_create_cycle(plan_id, depends_on) {
            return Err(PlanError::DependencyCycle {
                plan_id: plan_id.to_owned(),
                depends_on: depends_on.to_owned(),
            });
        }
        Ok(self.graph.insert_edge(plan_id, depends_on))
    }

    /// Ok if every dependency of `plan_id` is active or completed.
    pub fn check_dependencies(&self, plan_id: &str) -> Result<()> {
        for dep_id in self.graph.dependencies_of(plan_id) {
            let dep = self.get(&dep_id)?;
            if !dep.status.satisfies_dependency() {
                return Err(PlanError::DependencyNotSatisfied {
                    plan_id: plan_id.to_owned(),
                    dependency: dep_id,
                    status: dep.status,
                });
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------

    pub fn active_count(&self) -> usize {
        self.plans
            .values()
            .filter(|p| p.status == PlanStatus::Active)
            .count()
    }

    /// Validate `action` on `plan_id` without mutating anything. Activating
    /// actions also check dependencies and the active-plan limit.
    pub fn check_transition(
        &self,
        plan_id: &str,
        action: PlanAction,
        max_active: Option<usize>,
    ) -> Result<PlanStatus> {
        let plan = self.get(plan_id)?;
        let next = PlanStateMachine::next_status(plan.status, action).ok_or_else(|| {
            PlanError::InvalidTransition {
                plan_id: plan_id.to_owned(),
                action,
                status: plan.status,
            }
        })?;

        if action.activates() {
            self.check_dependencies(plan_id)?;
            if let Some(limit) = max_active {
                if self.active_count() >= limit {
                    return Err(PlanError::ActiveLimitReached {
                        plan_id: plan_id.to_owned(),
                        limit,
                    });
                }
            }
        }

        Ok(next)
    }

    /// Validate and apply `action`, setting timestamps. Returns the previous
    /// status. Nothing is mutated on error.
    pub fn apply_transition(
        &mut self,
        plan_id: &str,
        action: PlanAction,
        max_active: Option<usize>,
    ) -> Result<PlanStatus> {
        let next = self.check_transition(plan_id, action, max_active)?;
        let now = Utc::now();
        let plan = self.get_mut(plan_id)?;
        let previous = plan.status;

        plan.status = next;
        if next == PlanStatus::Active && plan.started_at.is_none() {
            plan.started_at = Some(now);
        }
        if matches!(next, PlanStatus::Completed | PlanStatus::Failed) {
            plan.completed_at = Some(now);
        }
        Ok(previous)
    }

    // -------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------

    pub fn snapshot(&self, plan: &PlanRecord) -> PlanSnapshot {
        PlanSnapshot {
            id: plan.id.clone(),
            name: plan.name.clone(),
            description: plan.description.clone(),
            priority: plan.priority,
            status: plan.status,
            parent_plan_id: plan.parent_plan_id.clone(),
            child_plan_ids: plan.child_plan_ids.clone(),
            workspace_path: plan.workspace_path.clone(),
            tags: plan.tags.clone(),
            goals: plan.goals.clone(),
            dependencies: self.graph.dependencies_of(&plan.id),
            assigned_agents: self.reservations.for_plan(&plan.id),
            created_at: plan.created_at,
            started_at: plan.started_at,
            completed_at: plan.completed_at,
        }
    }
}
