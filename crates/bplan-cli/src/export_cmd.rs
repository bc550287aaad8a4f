use std::io::Write;
use std::path::Path;

use anyhow::Result;

use bplan_core::BuildPlanManager;

/// Export all plans and agent workload as JSON.
pub fn run_export(manager: &BuildPlanManager, path: &Path, out: &mut dyn Write) -> Result<()> {
    let doc = manager.export();
    doc.write_to(path)?;
    writeln!(
        out,
        "Exported {} plan(s) and {} agent(s) to {}",
        doc.plans.len(),
        doc.agent_workload.len(),
        path.display()
    )?;
    Ok(())
}
