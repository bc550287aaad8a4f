//! Handlers for agent subcommands: reserve, release, dispatch and the
//! workload table.

use std::io::Write;

use anyhow::Result;

use bplan_core::BuildPlanManager;

use crate::resolve::resolve_plan_ref;

pub async fn cmd_reserve(
    manager: &BuildPlanManager,
    plan_ref: &str,
    agent: &str,
    exclusive: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let plan_id = resolve_plan_ref(manager, plan_ref)?;
    let reservation = manager.reserve_agent(&plan_id, agent, exclusive).await?;
    let mode = if reservation.exclusive { "exclusive" } else { "shared" };
    writeln!(out, "Agent {agent} reserved for plan {plan_id} ({mode})")?;
    Ok(())
}

pub async fn cmd_release(
    manager: &BuildPlanManager,
    plan_ref: &str,
    agent: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let plan_id = resolve_plan_ref(manager, plan_ref)?;
    if manager.release_agent(&plan_id, agent).await? {
        writeln!(out, "Agent {agent} released from plan {plan_id}")?;
    } else {
        writeln!(out, "Agent {agent} was not reserved by plan {plan_id}")?;
    }
    Ok(())
}

pub async fn cmd_dispatch(
    manager: &BuildPlanManager,
    plan_ref: &str,
    agent: &str,
    goal_index: usize,
    out: &mut dyn Write,
) -> Result<()> {
    let plan_id = resolve_plan_ref(manager, plan_ref)?;
    let result = manager.dispatch_goal(&plan_id, agent, goal_index).await?;

    let outcome = if result.success { "succeeded" } else { "not completed" };
    writeln!(out, "Goal {goal_index} of plan {plan_id} {outcome}")?;
    writeln!(out, "  Agent:   {}", result.agent.as_deref().unwrap_or(agent))?;
    writeln!(out, "  Message: {}", result.message)?;
    for artifact in &result.artifacts {
        writeln!(out, "  - {artifact}")?;
    }
    Ok(())
}

/// Print one row per reserved agent.
pub fn cmd_agents(manager: &BuildPlanManager, out: &mut dyn Write) -> Result<()> {
    let workload = manager.get_agent_workload();
    if workload.is_empty() {
        writeln!(out, "No agents reserved.")?;
        return Ok(());
    }

    let name_w = workload.keys().map(String::len).max().unwrap_or(5).max(5);
    writeln!(out, "{:<name_w$}  {:<9}  {:>5}  PLANS", "AGENT", "MODE", "COUNT")?;
    writeln!(out, "{}", "-".repeat(name_w + 26))?;
    for (agent, load) in &workload {
        let mode = if load.exclusive { "exclusive" } else { "shared" };
        let plans: Vec<&str> = load.plans.iter().map(String::as_str).collect();
        writeln!(
            out,
            "{:<name_w$}  {:<9}  {:>5}  {}",
            agent,
            mode,
            load.total,
            plans.join(", ")
        )?;
    }
    Ok(())
}
