//! `bplan status`, `bplan ready` and `bplan order`: read-only views of the
//! manager.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use bplan_core::{BuildPlanManager, PlanSnapshot, PlanStatus};

use crate::resolve::resolve_plan_ref;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Run the status command.
///
/// With a plan reference, shows that plan in detail. Without one, lists
/// every plan (optionally filtered by status) followed by a summary line.
pub fn run_status(
    manager: &BuildPlanManager,
    plan_ref: Option<&str>,
    filter: Option<PlanStatus>,
    out: &mut dyn Write,
) -> Result<()> {
    match plan_ref {
        Some(plan_ref) => run_plan_status(manager, plan_ref, out),
        None => run_fleet_status(manager, filter, out),
    }
}

/// Show detailed status for a single plan.
fn run_plan_status(manager: &BuildPlanManager, plan_ref: &str, out: &mut dyn Write) -> Result<()> {
    let plan_id = resolve_plan_ref(manager, plan_ref)?;
    let Some(plan) = manager.get_plan_status(&plan_id) else {
        bail!("plan {plan_id} not found");
    };

    writeln!(out, "Plan: {} ({})", plan.name, plan.id)?;
    writeln!(out, "Status:   {}", plan.status)?;
    writeln!(out, "Priority: {}", plan.priority)?;
    if !plan.description.is_empty() {
        writeln!(out, "Description: {}", plan.description)?;
    }
    if let Some(parent) = &plan.parent_plan_id {
        writeln!(out, "Parent: {parent}")?;
    }
    if !plan.child_plan_ids.is_empty() {
        writeln!(out, "Children: {}", join(plan.child_plan_ids.iter()))?;
    }
    if let Some(workspace) = &plan.workspace_path {
        writeln!(out, "Workspace: {}", workspace.display())?;
    }
    if !plan.tags.is_empty() {
        writeln!(out, "Tags: {}", join(plan.tags.iter()))?;
    }
    writeln!(out, "Created: {}", fmt_time(plan.created_at))?;
    if let Some(started_at) = plan.started_at {
        writeln!(out, "Started: {}", fmt_time(started_at))?;
    }
    if let Some(completed_at) = plan.completed_at {
        writeln!(out, "Finished: {}", fmt_time(completed_at))?;
    }

    if !plan.dependencies.is_empty() {
        writeln!(out)?;
        writeln!(out, "Dependencies:")?;
        for dep in &plan.dependencies {
            let status = manager
                .get_plan_status(dep)
                .map(|d| d.status.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            writeln!(out, "  {dep} ({status})")?;
        }
    }

    writeln!(out)?;
    if plan.goals.is_empty() {
        writeln!(out, "Goals: none")?;
    } else {
        writeln!(out, "Goals:")?;
        for (index, goal) in plan.goals.iter().enumerate() {
            writeln!(out, "  [{index}] {}", goal.description)?;
            for criterion in &goal.success_criteria {
                writeln!(out, "      + {criterion}")?;
            }
            for constraint in &goal.constraints {
                writeln!(out, "      ! {constraint}")?;
            }
        }
    }

    if !plan.assigned_agents.is_empty() {
        writeln!(out)?;
        writeln!(out, "Agents:")?;
        for (agent, reservation) in &plan.assigned_agents {
            let mode = if reservation.exclusive { "exclusive" } else { "shared" };
            writeln!(out, "  {agent} ({mode})")?;
        }
    }

    Ok(())
}

/// List all plans with a summary line.
fn run_fleet_status(
    manager: &BuildPlanManager,
    filter: Option<PlanStatus>,
    out: &mut dyn Write,
) -> Result<()> {
    let plans = manager.list_plans(filter);

    if plans.is_empty() {
        match filter {
            Some(status) => writeln!(out, "No {status} plans.")?,
            None => writeln!(out, "No plans found.")?,
        }
        return Ok(());
    }

    write_plan_table(&plans, out)?;

    let summary = manager.status_summary();
    writeln!(out)?;
    let counts: Vec<String> = PlanStatus::ALL
        .iter()
        .map(|&status| format!("{status}={}", summary.count(status)))
        .collect();
    writeln!(out, "Total: {}  {}", summary.total, counts.join(" "))?;
    Ok(())
}

/// `bplan ready`: created plans whose dependencies are satisfied.
pub fn run_ready(manager: &BuildPlanManager, out: &mut dyn Write) -> Result<()> {
    let ready = manager.ready_plans();
    if ready.is_empty() {
        writeln!(out, "No plans are ready to start.")?;
        return Ok(());
    }
    write_plan_table(&ready, out)
}

/// `bplan order`: every plan, dependencies first.
pub fn run_order(manager: &BuildPlanManager, out: &mut dyn Write) -> Result<()> {
    let order = manager.execution_order();
    if order.is_empty() {
        writeln!(out, "No plans found.")?;
        return Ok(());
    }
    for (position, plan_id) in order.iter().enumerate() {
        match manager.get_plan_status(plan_id) {
            Some(plan) => writeln!(
                out,
                "{:>3}. {} {} [{}]",
                position + 1,
                plan.id,
                plan.name,
                plan.status
            )?,
            None => writeln!(out, "{:>3}. {plan_id}", position + 1)?,
        }
    }
    Ok(())
}

fn write_plan_table(plans: &[PlanSnapshot], out: &mut dyn Write) -> Result<()> {
    let name_w = plans.iter().map(|p| p.name.len()).max().unwrap_or(4).clamp(4, 30);

    writeln!(
        out,
        "{:<36}  {:<name_w$}  {:<9}  {:<8}  {:>5}  {:>6}",
        "ID", "NAME", "STATUS", "PRIORITY", "GOALS", "AGENTS"
    )?;
    writeln!(out, "{}", "-".repeat(36 + name_w + 9 + 8 + 5 + 6 + 10))?;

    for plan in plans {
        let name = if plan.name.len() > name_w {
            let cut = truncate_at(&plan.name, name_w - 3);
            format!("{cut}...")
        } else {
            plan.name.clone()
        };
        writeln!(
            out,
            "{:<36}  {:<name_w$}  {:<9}  {:<8}  {:>5}  {:>6}",
            plan.id,
            name,
            plan.status,
            plan.priority,
            plan.goals.len(),
            plan.assigned_agents.len()
        )?;
    }
    Ok(())
}

/// Longest prefix of `s` no longer than `max` bytes, on a char boundary.
fn truncate_at(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn fmt_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn join<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}
