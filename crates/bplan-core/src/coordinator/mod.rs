//! Agent coordinator interface.
//!
//! The [`BuildPlanManager`](crate::BuildPlanManager) never talks to agents
//! directly. Anything that touches a live agent goes through an
//! [`AgentCoordinator`], which may in turn consult a [`KnowledgeBase`].
//!
//! ```text
//! BuildPlanManager
//!     |
//!     v
//! Arc<dyn AgentCoordinator>
//!     |  reserve / release
//!     |  notify_plan_started / notify_plan_suspended
//!     |  notify_plan_start_aborted
//!     |  dispatch_goal ---------> KnowledgeBase::guidance
//! ```

pub mod knowledge;
pub mod local;
pub mod registry;
pub mod trait_def;

pub use knowledge::{GuidanceDoc, KnowledgeBase, StaticKnowledgeBase};
pub use local::LocalCoordinator;
pub use registry::CoordinatorRegistry;
pub use trait_def::AgentCoordinator;
