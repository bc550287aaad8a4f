//! Directed dependency graph over plan ids.
//!
//! An edge `plan -> depends_on` means `plan` requires `depends_on`. The
//! graph is kept acyclic: callers must check [`DependencyGraph::would_create_cycle`]
//! before [`DependencyGraph::insert_edge`], both under the same registry lock.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Outgoing edges, keyed by the dependent plan.
    edges: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with no edges. Idempotent.
    pub fn add_node(&mut self, id: &str) {
        self.edges.entry(id.to_owned()).or_default();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    /// Direct dependencies of `id` (empty if unknown).
    pub fn dependencies_of(&self, id: &str) -> BTreeSet<String> {
        self.edges.get(id).cloned().unwrap_or_default()
    }

    pub fn has_edge(&self, plan: &str, depends_on: &str) -> bool {
        self.edges
            .get(plan)
            .is_some_and(|deps| deps.contains(depends_on))
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Whether `to` can be reached from `from` by following edges.
    /// A node always reaches itself.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut seen: HashSet<&str> = HashSet::new();

        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(deps) = self.edges.get(node) {
                stack.extend(deps.iter().map(String::as_str));
            }
        }
        false
    }

    /// Whether adding `plan -> depends_on` would close a cycle, i.e. `plan`
    /// is already reachable from `depends_on`. Self edges count as cycles.
    pub fn would_create_cycle(&self, plan: &str, depends_on: &str) -> bool {
        self.reaches(depends_on, plan)
    }

    /// Insert `plan -> depends_on`. Returns `false` if the edge already
    /// existed. Both endpoints are registered as nodes.
    pub fn insert_edge(&mut self, plan: &str, depends_on: &str) -> bool {
        debug_assert!(!self.would_create_cycle(plan, depends_on));
        self.add_node(depends_on);
        self.edges
            .entry(plan.to_owned())
            .or_default()
            .insert(depends_on.to_owned())
    }

    /// Topological order with dependencies first (Kahn's algorithm).
    ///
    /// Among nodes that are ready at the same time, the one with the
    /// smallest `key` is emitted first.
    pub fn topological_order<K, F>(&self, key: F) -> Vec<String>
    where
        K: Ord,
        F: Fn(&str) -> K,
    {
        // Remaining unmet dependencies per node, plus the reverse adjacency.
        let mut pending: HashMap<&str, usize> = HashMap::with_capacity(self.edges.len());
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for (node, deps) in &self.edges {
            pending.insert(node.as_str(), deps.len());
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(node.as_str());
            }
        }

        let mut ready: BinaryHeap<Reverse<(K, &str)>> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&node, _)| Reverse((key(node), node)))
            .collect();

        let mut order = Vec::with_capacity(pending.len());
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(node.to_owned());
            for &dependent in dependents.get(node).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse((key(dependent), dependent)));
                    }
                }
            }
        }

        order
    }
}
