//! Shared test utilities for bplan integration tests.
//!
//! Provides [`RecordingCoordinator`], an [`AgentCoordinator`] that records
//! every call and can be told to refuse or fail specific operations, plus
//! helpers for building a manager around it.
//!
//! Races are made deterministic with gates: a gated call records itself,
//! then waits twice on a shared [`Barrier`] (once to announce it is in
//! flight, once to be let go) before answering.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::Barrier;

use anyhow::{Result, bail};
use async_trait::async_trait;

use bplan_core::{
    AgentCoordinator, BuildPlanManager, Goal, GoalResult, ManagerConfig, NewPlan, PlanSnapshot,
};

/// One call observed by a [`RecordingCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorCall {
    Reserve {
        agent: String,
        plan_id: String,
        exclusive: bool,
    },
    Release {
        agent: String,
        plan_id: String,
    },
    Started(String),
    Suspended(String),
    StartAborted(String),
    Dispatch {
        agent: String,
        plan_id: String,
        goal: String,
    },
}

#[derive(Debug, Default)]
struct Faults {
    refuse_agents: HashSet<String>,
    fail_agents: HashSet<String>,
    fail_release: bool,
    fail_notify: bool,
}

#[derive(Debug, Default)]
struct Gates {
    reserve: Option<Arc<Barrier>>,
    start: Option<Arc<Barrier>>,
}

/// Hold a gated call until every party has passed the barrier twice.
async fn pass(gate: Option<Arc<Barrier>>) {
    if let Some(barrier) = gate {
        barrier.wait().await;
        barrier.wait().await;
    }
}

/// Coordinator that records calls and injects faults on demand.
#[derive(Debug, Default)]
pub struct RecordingCoordinator {
    calls: Mutex<Vec<CoordinatorCall>>,
    faults: Mutex<Faults>,
    gates: Mutex<Gates>,
}

impl RecordingCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `Ok(false)` to reservations of `agent`.
    pub fn refuse(&self, agent: &str) {
        self.faults.lock().unwrap().refuse_agents.insert(agent.to_string());
    }

    /// Answer `Err` to reservations and dispatches for `agent`.
    pub fn fail_agent(&self, agent: &str) {
        self.faults.lock().unwrap().fail_agents.insert(agent.to_string());
    }

    /// Make every `release` call fail.
    pub fn fail_releases(&self) {
        self.faults.lock().unwrap().fail_release = true;
    }

    /// Make start/suspend notifications fail.
    pub fn fail_notifications(&self) {
        self.faults.lock().unwrap().fail_notify = true;
    }

    /// Gate every later `reserve` call on a barrier of `parties`. The
    /// returned barrier lets the test itself be one of the parties.
    pub fn gate_reservations(&self, parties: usize) -> Arc<Barrier> {
        let barrier = Arc::new(Barrier::new(parties));
        self.gates.lock().unwrap().reserve = Some(barrier.clone());
        barrier
    }

    /// Gate every later `notify_plan_started` call on a barrier of
    /// `parties`.
    pub fn gate_starts(&self, parties: usize) -> Arc<Barrier> {
        let barrier = Arc::new(Barrier::new(parties));
        self.gates.lock().unwrap().start = Some(barrier.clone());
        barrier
    }

    /// Clear all injected faults.
    pub fn heal(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    pub fn calls(&self) -> Vec<CoordinatorCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Agents released for `plan_id`, in call order.
    pub fn released_for(&self, plan_id: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CoordinatorCall::Release { agent, plan_id: p } if p == plan_id => Some(agent),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: CoordinatorCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AgentCoordinator for RecordingCoordinator {
    fn name(&self) -> &str {
        "recording"
    }

    async fn reserve(&self, agent: &str, plan_id: &str, exclusive: bool) -> Result<bool> {
        self.record(CoordinatorCall::Reserve {
            agent: agent.to_string(),
            plan_id: plan_id.to_string(),
            exclusive,
        });
        let gate = self.gates.lock().unwrap().reserve.clone();
        pass(gate).await;

        let faults = self.faults.lock().unwrap();
        if faults.fail_agents.contains(agent) {
            bail!("agent {agent} is unreachable");
        }
        Ok(!faults.refuse_agents.contains(agent))
    }

    async fn release(&self, agent: &str, plan_id: &str) -> Result<()> {
        self.record(CoordinatorCall::Release {
            agent: agent.to_string(),
            plan_id: plan_id.to_string(),
        });
        if self.faults.lock().unwrap().fail_release {
            bail!("release of {agent} failed");
        }
        Ok(())
    }

    async fn notify_plan_started(&self, plan_id: &str) -> Result<()> {
        self.record(CoordinatorCall::Started(plan_id.to_string()));
        let gate = self.gates.lock().unwrap().start.clone();
        pass(gate).await;

        if self.faults.lock().unwrap().fail_notify {
            bail!("notification for {plan_id} failed");
        }
        Ok(())
    }

    async fn notify_plan_suspended(&self, plan_id: &str) -> Result<()> {
        self.record(CoordinatorCall::Suspended(plan_id.to_string()));
        if self.faults.lock().unwrap().fail_notify {
            bail!("notification for {plan_id} failed");
        }
        Ok(())
    }

    async fn notify_plan_start_aborted(&self, plan_id: &str) -> Result<()> {
        self.record(CoordinatorCall::StartAborted(plan_id.to_string()));
        Ok(())
    }

    async fn dispatch_goal(&self, agent: &str, plan_id: &str, goal: &Goal) -> Result<GoalResult> {
        self.record(CoordinatorCall::Dispatch {
            agent: agent.to_string(),
            plan_id: plan_id.to_string(),
            goal: goal.description.clone(),
        });
        if self.faults.lock().unwrap().fail_agents.contains(agent) {
            bail!("agent {agent} is unreachable");
        }
        Ok(GoalResult {
            success: true,
            message: format!("{agent} finished {:?}", goal.description),
            artifacts: vec![],
            agent: Some(agent.to_string()),
        })
    }
}

/// A manager backed by a fresh [`RecordingCoordinator`].
pub fn recording_manager(config: ManagerConfig) -> (BuildPlanManager, Arc<RecordingCoordinator>) {
    let coordinator = RecordingCoordinator::new();
    let manager = BuildPlanManager::new(coordinator.clone(), config);
    (manager, coordinator)
}

/// Create one plan per name with default settings.
pub fn create_plans(manager: &BuildPlanManager, names: &[&str]) -> Vec<PlanSnapshot> {
    names
        .iter()
        .map(|name| {
            manager
                .create_plan(NewPlan::new(*name))
                .unwrap_or_else(|e| panic!("failed to create plan {name}: {e}"))
        })
        .collect()
}
