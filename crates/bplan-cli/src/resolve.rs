//! Plan reference resolution.
//!
//! Plan ids are random UUIDs, so the CLI also accepts a plan name or a
//! unique id prefix wherever a plan id is expected.

use anyhow::{Result, bail};

use bplan_core::BuildPlanManager;

/// Shortest id prefix accepted as a reference.
const MIN_PREFIX_LEN: usize = 4;

/// Resolve `input` to a plan id.
///
/// Tried in order: exact id, exact name, id prefix. A name or prefix that
/// matches several plans is an error. Input that matches nothing is
/// returned unchanged so the manager can report it as not found.
pub fn resolve_plan_ref(manager: &BuildPlanManager, input: &str) -> Result<String> {
    if manager.get_plan_status(input).is_some() {
        return Ok(input.to_string());
    }

    let plans = manager.list_plans(None);

    let by_name: Vec<&str> = plans
        .iter()
        .filter(|p| p.name == input)
        .map(|p| p.id.as_str())
        .collect();
    match by_name.as_slice() {
        [id] => return Ok((*id).to_string()),
        [] => {}
        many => bail!(
            "plan name {input:?} is ambiguous ({} plans); use an id",
            many.len()
        ),
    }

    if input.len() >= MIN_PREFIX_LEN {
        let by_prefix: Vec<&str> = plans
            .iter()
            .filter(|p| p.id.starts_with(input))
            .map(|p| p.id.as_str())
            .collect();
        match by_prefix.as_slice() {
            [id] => return Ok((*id).to_string()),
            [] => {}
            many => bail!("id prefix {input:?} matches {} plans", many.len()),
        }
    }

    Ok(input.to_string())
}
