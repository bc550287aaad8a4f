//! JSON export of manager state.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AgentWorkload, PlanSnapshot};

/// Everything the manager knows at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub export_timestamp: DateTime<Utc>,
    pub plans: Vec<PlanSnapshot>,
    pub agent_workload: BTreeMap<String, AgentWorkload>,
}

impl ExportDocument {
    pub fn new(plans: Vec<PlanSnapshot>, agent_workload: BTreeMap<String, AgentWorkload>) -> Self {
        Self {
            export_timestamp: Utc::now(),
            plans,
            agent_workload,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize export")
    }

    /// Write the document as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let json = self.to_json_pretty()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write export to {}", path.display()))?;
        tracing::info!(path = %path.display(), plans = self.plans.len(), "export written");
        Ok(())
    }
}
