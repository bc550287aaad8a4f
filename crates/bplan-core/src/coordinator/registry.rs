//! Coordinator registry: a named collection of available coordinators.
//!
//! Lets the CLI pick a coordinator by the name written in its config file.

use std::collections::HashMap;
use std::sync::Arc;

use super::local::LocalCoordinator;
use super::trait_def::AgentCoordinator;

#[derive(Default)]
pub struct CoordinatorRegistry {
    coordinators: HashMap<String, Arc<dyn AgentCoordinator>>,
}

impl CoordinatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry containing the built-in `local` coordinator.
    pub fn with_builtins(local: LocalCoordinator) -> Self {
        let mut registry = Self::new();
        registry.register(local);
        registry
    }

    /// Register a coordinator under [`AgentCoordinator::name`], returning
    /// any coordinator it replaced.
    pub fn register(
        &mut self,
        coordinator: impl AgentCoordinator + 'static,
    ) -> Option<Arc<dyn AgentCoordinator>> {
        let name = coordinator.name().to_string();
        self.coordinators.insert(name, Arc::new(coordinator))
    }

    /// Look up a coordinator by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentCoordinator>> {
        self.coordinators.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.coordinators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }
}

impl std::fmt::Debug for CoordinatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorRegistry")
            .field("coordinators", &self.list())
            .finish()
    }
}
