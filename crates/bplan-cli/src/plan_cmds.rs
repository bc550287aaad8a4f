//! Handlers for plan-level subcommands.
//!
//! Implements:
//! - `bplan create <name>`                      -- create a plan
//! - `bplan add-goal <plan> <description>`      -- append a goal
//! - `bplan start|suspend|resume|complete|fail|cancel <plan>`
//! - `bplan add-dependency <plan> <depends-on>` -- add a dependency edge

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;

use bplan_core::{BuildPlanManager, Goal, NewPlan, PlanAction, PlanPriority};

use crate::resolve::resolve_plan_ref;

/// Parsed arguments of `bplan create`.
#[derive(Debug)]
pub struct CreateArgs {
    pub name: String,
    pub description: String,
    pub priority: PlanPriority,
    pub parent: Option<String>,
    pub workspace: Option<PathBuf>,
    pub tags: Vec<String>,
}

// -----------------------------------------------------------------------
// bplan create
// -----------------------------------------------------------------------

pub fn cmd_create(manager: &BuildPlanManager, args: CreateArgs, out: &mut dyn Write) -> Result<()> {
    let mut new = NewPlan::new(args.name)
        .description(args.description)
        .priority(args.priority)
        .tags(args.tags.into_iter().filter(|t| !t.is_empty()));
    if let Some(parent) = args.parent {
        new = new.parent(resolve_plan_ref(manager, &parent)?);
    }
    if let Some(workspace) = args.workspace {
        new = new.workspace(workspace);
    }

    let plan = manager.create_plan(new)?;

    writeln!(out, "Plan created: {}", plan.id)?;
    writeln!(out, "  Name:     {}", plan.name)?;
    writeln!(out, "  Priority: {}", plan.priority)?;
    writeln!(out, "  Status:   {}", plan.status)?;
    if let Some(parent) = &plan.parent_plan_id {
        writeln!(out, "  Parent:   {parent}")?;
    }
    Ok(())
}

// -----------------------------------------------------------------------
// bplan add-goal
// -----------------------------------------------------------------------

pub fn cmd_add_goal(
    manager: &BuildPlanManager,
    plan_ref: &str,
    description: String,
    criteria: Vec<String>,
    constraints: Vec<String>,
    out: &mut dyn Write,
) -> Result<()> {
    let plan_id = resolve_plan_ref(manager, plan_ref)?;
    let goal = Goal::new(description)
        .criteria(criteria.into_iter().filter(|c| !c.is_empty()))
        .constraints(constraints.into_iter().filter(|c| !c.is_empty()));
    let index = manager.add_goal_to_plan(&plan_id, goal)?;
    writeln!(out, "Goal {index} added to plan {plan_id}")?;
    Ok(())
}

// -----------------------------------------------------------------------
// Lifecycle transitions
// -----------------------------------------------------------------------

pub async fn cmd_transition(
    manager: &BuildPlanManager,
    plan_ref: &str,
    action: PlanAction,
    out: &mut dyn Write,
) -> Result<()> {
    let plan_id = resolve_plan_ref(manager, plan_ref)?;
    match action {
        PlanAction::Start => manager.start(&plan_id).await?,
        PlanAction::Suspend => manager.suspend(&plan_id).await?,
        PlanAction::Resume => manager.resume(&plan_id).await?,
        PlanAction::Complete => manager.complete(&plan_id)?,
        PlanAction::Fail => manager.fail(&plan_id)?,
        PlanAction::Cancel => manager.cancel(&plan_id).await?,
    }

    // The plan exists: the transition above would have failed otherwise.
    let status = manager
        .get_plan_status(&plan_id)
        .map(|p| p.status.to_string())
        .unwrap_or_default();
    writeln!(out, "Plan {plan_id}: {status}")?;
    Ok(())
}

// -----------------------------------------------------------------------
// bplan add-dependency
// -----------------------------------------------------------------------

pub fn cmd_add_dependency(
    manager: &BuildPlanManager,
    plan_ref: &str,
    depends_on_ref: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let plan_id = resolve_plan_ref(manager, plan_ref)?;
    let depends_on = resolve_plan_ref(manager, depends_on_ref)?;
    if manager.add_dependency(&plan_id, &depends_on)? {
        writeln!(out, "Plan {plan_id} now depends on {depends_on}")?;
    } else {
        writeln!(out, "Plan {plan_id} already depends on {depends_on}")?;
    }
    Ok(())
}
