//! In-process coordinator used when no external agent runtime is attached.
//!
//! It accepts reservations for the agents on its roster (or for any agent
//! when the roster is empty) and answers goal dispatches with a stub result
//! annotated with knowledge-base guidance. It never performs real work.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::knowledge::KnowledgeBase;
use super::trait_def::AgentCoordinator;
use crate::models::{Goal, GoalResult};

#[derive(Clone, Default)]
pub struct LocalCoordinator {
    roster: BTreeSet<String>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
}

impl LocalCoordinator {
    /// A coordinator that accepts any agent name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict reservations to the named agents. An empty roster accepts
    /// any agent.
    pub fn with_roster<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roster = agents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn roster(&self) -> &BTreeSet<String> {
        &self.roster
    }

    /// Whether `agent` is known to this coordinator.
    pub fn knows(&self, agent: &str) -> bool {
        self.roster.is_empty() || self.roster.contains(agent)
    }
}

impl std::fmt::Debug for LocalCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCoordinator")
            .field("roster", &self.roster)
            .field("knowledge", &self.knowledge.is_some())
            .finish()
    }
}

#[async_trait]
impl AgentCoordinator for LocalCoordinator {
    fn name(&self) -> &str {
        "local"
    }

    async fn reserve(&self, agent: &str, plan_id: &str, exclusive: bool) -> Result<bool> {
        if !self.knows(agent) {
            tracing::warn!(agent, plan_id, "refusing reservation for unknown agent");
            return Ok(false);
        }
        tracing::debug!(agent, plan_id, exclusive, "local reservation granted");
        Ok(true)
    }

    async fn release(&self, agent: &str, plan_id: &str) -> Result<()> {
        tracing::debug!(agent, plan_id, "local reservation released");
        Ok(())
    }

    async fn notify_plan_started(&self, plan_id: &str) -> Result<()> {
        tracing::debug!(plan_id, "plan started");
        Ok(())
    }

    async fn notify_plan_suspended(&self, plan_id: &str) -> Result<()> {
        tracing::debug!(plan_id, "plan suspended");
        Ok(())
    }

    async fn notify_plan_start_aborted(&self, plan_id: &str) -> Result<()> {
        tracing::debug!(plan_id, "plan start aborted");
        Ok(())
    }

    async fn dispatch_goal(&self, agent: &str, plan_id: &str, goal: &Goal) -> Result<GoalResult> {
        if !self.knows(agent) {
            bail!("agent {agent} is not on the local roster");
        }

        let guidance = self
            .knowledge
            .as_ref()
            .map(|kb| kb.guidance(&goal.description))
            .unwrap_or_default();

        tracing::info!(
            agent,
            plan_id,
            guidance = guidance.len(),
            "goal recorded without an agent runtime"
        );

        Ok(GoalResult {
            success: false,
            message: format!(
                "no agent runtime attached; goal {:?} recorded with {} guidance document(s)",
                goal.description,
                guidance.len()
            ),
            artifacts: guidance.into_iter().map(|doc| doc.title).collect(),
            agent: Some(agent.to_owned()),
        })
    }
}
