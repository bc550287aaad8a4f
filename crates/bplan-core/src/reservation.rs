//! Agent reservation bookkeeping.
//!
//! Tracks which plans hold which agents, and whether the hold is exclusive.
//! The table does not serialize actual agent invocations; it only records
//! who may use an agent.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;

use crate::models::{AgentReservation, AgentWorkload};

/// A reservation request that collides with another plan's hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Plan currently holding the agent.
    pub holder: String,
}

#[derive(Debug, Default, Clone)]
pub struct ReservationTable {
    /// agent name -> plan id -> reservation
    by_agent: HashMap<String, BTreeMap<String, AgentReservation>>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `plan_id` may reserve `agent` in the requested mode.
    ///
    /// - exclusive: conflicts with any reservation held by another plan.
    /// - shared: conflicts with an exclusive reservation held by another plan.
    ///
    /// A plan's own reservation never conflicts with itself, so re-reserving
    /// replaces the existing entry.
    pub fn check(&self, agent: &str, plan_id: &str, exclusive: bool) -> Result<(), Conflict> {
        let Some(holders) = self.by_agent.get(agent) else {
            return Ok(());
        };

        let blocking = holders
            .values()
            .filter(|r| r.plan_id != plan_id)
            .find(|r| exclusive || r.exclusive);

        match blocking {
            Some(r) => Err(Conflict {
                holder: r.plan_id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Record a reservation after [`Self::check`] succeeded.
    pub fn insert(&mut self, agent: &str, plan_id: &str, exclusive: bool) -> AgentReservation {
        let reservation = AgentReservation {
            agent_name: agent.to_owned(),
            plan_id: plan_id.to_owned(),
            exclusive,
            reserved_at: Utc::now(),
        };
        self.by_agent
            .entry(agent.to_owned())
            .or_default()
            .insert(plan_id.to_owned(), reservation.clone());
        reservation
    }

    /// Remove the reservation for `(plan_id, agent)`. Returns the removed
    /// entry, or `None` if there was nothing to remove.
    pub fn remove(&mut self, agent: &str, plan_id: &str) -> Option<AgentReservation> {
        let holders = self.by_agent.get_mut(agent)?;
        let removed = holders.remove(plan_id);
        if holders.is_empty() {
            self.by_agent.remove(agent);
        }
        removed
    }

    /// Remove every reservation held by `plan_id`, returning them.
    pub fn remove_plan(&mut self, plan_id: &str) -> Vec<AgentReservation> {
        let mut removed = Vec::new();
        self.by_agent.retain(|_, holders| {
            if let Some(r) = holders.remove(plan_id) {
                removed.push(r);
            }
            !holders.is_empty()
        });
        removed.sort_by(|a, b| a.agent_name.cmp(&b.agent_name));
        removed
    }

    pub fn get(&self, agent: &str, plan_id: &str) -> Option<&AgentReservation> {
        self.by_agent.get(agent)?.get(plan_id)
    }

    /// All reservations held by `plan_id`, keyed by agent name.
    pub fn for_plan(&self, plan_id: &str) -> BTreeMap<String, AgentReservation> {
        self.by_agent
            .iter()
            .filter_map(|(agent, holders)| {
                holders
                    .get(plan_id)
                    .map(|r| (agent.clone(), r.clone()))
            })
            .collect()
    }

    /// Per-agent aggregation of current reservations.
    pub fn workload(&self) -> BTreeMap<String, AgentWorkload> {
        self.by_agent
            .iter()
            .map(|(agent, holders)| {
                let workload = AgentWorkload {
                    plans: holders.keys().cloned().collect(),
                    exclusive: holders.values().any(|r| r.exclusive),
                    total: holders.len(),
                };
                (agent.clone(), workload)
            })
            .collect()
    }
}
