use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Scheduling preference of a plan.
///
/// Ordered `Low < Medium < High < Critical`. Priority is advisory: it only
/// affects the order in which ready plans are reported.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PlanPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for PlanPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.pad(s)
    }
}

impl FromStr for PlanPriority {
    type Err = PlanPriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(PlanPriorityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanPriority`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid plan priority: {0:?} (expected low, medium, high or critical)")]
pub struct PlanPriorityParseError(pub String);

// ---------------------------------------------------------------------------

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Created,
    Active,
    Suspended,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [PlanStatus; 6] = [
        Self::Created,
        Self::Active,
        Self::Suspended,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a plan in this status satisfies a dependency edge pointing
    /// at it. Active plans count so cooperating plans can run side by side.
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, Self::Active | Self::Completed)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.pad(s)
    }
}

impl FromStr for PlanStatus {
    type Err = PlanStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(PlanStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanStatus`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid plan status: {0:?}")]
pub struct PlanStatusParseError(pub String);

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

/// A desired outcome attached to a plan.
///
/// The manager stores and forwards goals; it never interprets their content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub description: String,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl Goal {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Set the success criteria.
    pub fn criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.success_criteria = criteria.into_iter().map(Into::into).collect();
        self
    }

    /// Set the constraints.
    pub fn constraints<I, S>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints = constraints.into_iter().map(Into::into).collect();
        self
    }

    /// Add one context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Outcome reported by a coordinator after a goal was dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub artifacts: Vec<String>,
    pub agent: Option<String>,
}

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

/// A plan's hold on a named agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReservation {
    pub agent_name: String,
    pub plan_id: String,
    pub exclusive: bool,
    pub reserved_at: DateTime<Utc>,
}

/// Aggregated view of the reservations on a single agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentWorkload {
    /// Plans currently holding a reservation on the agent.
    pub plans: BTreeSet<String>,
    /// True if any of the reservations is exclusive.
    pub exclusive: bool,
    /// Number of reservations.
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Owned, point-in-time copy of a plan.
///
/// Returned by every read operation of the manager so callers never hold a
/// reference into the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub id: String,
    pub name: String,
    pub description: String,
    pub priority: PlanPriority,
    pub status: PlanStatus,
    pub parent_plan_id: Option<String>,
    pub child_plan_ids: BTreeSet<String>,
    pub workspace_path: Option<PathBuf>,
    pub tags: BTreeSet<String>,
    pub goals: Vec<Goal>,
    pub dependencies: BTreeSet<String>,
    pub assigned_agents: BTreeMap<String, AgentReservation>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Plan counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total: usize,
    pub created: usize,
    pub active: usize,
    pub suspended: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl PlanSummary {
    pub(crate) fn record(&mut self, status: PlanStatus) {
        self.total += 1;
        let slot = match status {
            PlanStatus::Created => &mut self.created,
            PlanStatus::Active => &mut self.active,
            PlanStatus::Suspended => &mut self.suspended,
            PlanStatus::Completed => &mut self.completed,
            PlanStatus::Failed => &mut self.failed,
            PlanStatus::Cancelled => &mut self.cancelled,
        };
        *slot += 1;
    }

    /// Number of plans in `status`.
    pub fn count(&self, status: PlanStatus) -> usize {
        match status {
            PlanStatus::Created => self.created,
            PlanStatus::Active => self.active,
            PlanStatus::Suspended => self.suspended,
            PlanStatus::Completed => self.completed,
            PlanStatus::Failed => self.failed,
            PlanStatus::Cancelled => self.cancelled,
        }
    }
}
