//! Configuration file management for bplan.
//!
//! Provides a TOML-based config file at `~/.config/bplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use bplan_core::coordinator::{GuidanceDoc, StaticKnowledgeBase};
use bplan_core::{AgentCoordinator, CoordinatorRegistry, LocalCoordinator, ManagerConfig};

/// Env var overriding `manager.max_active_plans`.
pub const MAX_ACTIVE_ENV: &str = "BPLAN_MAX_ACTIVE_PLANS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub manager: ManagerSection,
    pub coordinator: CoordinatorSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_active_plans: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSection {
    /// Registry key of the coordinator to use.
    pub kind: String,
    /// Agents the local coordinator accepts. Empty accepts any.
    pub agents: Vec<String>,
    pub guidance: Vec<GuidanceEntry>,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            kind: "local".to_string(),
            agents: Vec::new(),
            guidance: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceEntry {
    pub keywords: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the bplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/bplan` or `~/.config/bplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("bplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("bplan")
}

/// Return the path to the bplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`. A missing file yields the
/// defaults; an unreadable or malformed one is an error.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ConfigFile::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file from [`config_path`].
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
pub struct BplanConfig {
    pub manager: ManagerConfig,
    pub coordinator: Arc<dyn AgentCoordinator>,
}

impl std::fmt::Debug for BplanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BplanConfig")
            .field("manager", &self.manager)
            .field("coordinator", &self.coordinator.name())
            .finish()
    }
}

impl BplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Active limit: `cli_max_active` > `BPLAN_MAX_ACTIVE_PLANS` > `manager.max_active_plans` > unlimited
    /// - Coordinator: `coordinator.kind` looked up in the built-in registry
    pub fn resolve(cli_max_active: Option<usize>) -> Result<Self> {
        Self::resolve_with(load_config()?, cli_max_active)
    }

    /// Resolve against an already-loaded config file.
    pub fn resolve_with(file: ConfigFile, cli_max_active: Option<usize>) -> Result<Self> {
        let max_active_plans = if let Some(limit) = cli_max_active {
            Some(limit)
        } else if let Ok(raw) = std::env::var(MAX_ACTIVE_ENV) {
            Some(
                raw.trim()
                    .parse::<usize>()
                    .with_context(|| format!("{MAX_ACTIVE_ENV} is not a valid count: {raw:?}"))?,
            )
        } else {
            file.manager.max_active_plans
        };

        let registry = CoordinatorRegistry::with_builtins(local_coordinator(&file.coordinator));
        let Some(coordinator) = registry.get(&file.coordinator.kind) else {
            bail!(
                "unknown coordinator kind {:?}; available: {}",
                file.coordinator.kind,
                registry.list().join(", ")
            );
        };

        tracing::debug!(
            max_active_plans = ?max_active_plans,
            coordinator = coordinator.name(),
            "configuration resolved"
        );

        Ok(Self {
            manager: ManagerConfig { max_active_plans },
            coordinator,
        })
    }
}

fn local_coordinator(section: &CoordinatorSection) -> LocalCoordinator {
    let local = LocalCoordinator::new().with_roster(section.agents.iter().cloned());
    if section.guidance.is_empty() {
        return local;
    }
    let knowledge = section
        .guidance
        .iter()
        .fold(StaticKnowledgeBase::new(), |kb, entry| {
            kb.with_doc(
                &entry.keywords,
                GuidanceDoc {
                    title: entry.title.clone(),
                    body: entry.body.clone(),
                },
            )
        });
    local.with_knowledge(Arc::new(knowledge))
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
