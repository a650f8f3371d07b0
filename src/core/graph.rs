//! Directed dependency graph for tasks.
//!
//! The graph records "task depends on prerequisite" edges together with a
//! reverse index, and answers the readiness, cycle, and ordering queries
//! the queue needs. Prerequisite ids are never validated: an edge to an id
//! that was never submitted is recorded like any other and simply never
//! becomes satisfiable.

use std::collections::{HashMap, HashSet, VecDeque};

use super::types::TaskId;

/// Node colors for the cycle-detection DFS.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed graph of task dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// task -> set of prerequisites.
    dependencies: HashMap<TaskId, HashSet<TaskId>>,
    /// prerequisite -> set of dependents.
    dependents: HashMap<TaskId, HashSet<TaskId>>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Check if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Check if `task` is a registered node.
    pub fn contains(&self, task: &TaskId) -> bool {
        self.dependencies.contains_key(task)
    }

    /// Register `task` as a node (even with no prerequisites) and record
    /// each dependency edge plus its reverse.
    pub fn add_task(&mut self, task: TaskId, deps: &HashSet<TaskId>) {
        self.dependencies
            .entry(task)
            .or_default()
            .extend(deps.iter().copied());
        for dep in deps {
            self.dependents.entry(*dep).or_default().insert(task);
        }
    }

    /// Remove a node, purge it from every dependent's prerequisite set, and
    /// drop its reverse-edge bucket.
    pub fn remove_task(&mut self, task: &TaskId) {
        if let Some(deps) = self.dependencies.remove(task) {
            for dep in &deps {
                if let Some(bucket) = self.dependents.get_mut(dep) {
                    bucket.remove(task);
                }
            }
        }
        if let Some(dependents) = self.dependents.remove(task) {
            for dependent in &dependents {
                if let Some(deps) = self.dependencies.get_mut(dependent) {
                    deps.remove(task);
                }
            }
        }
    }

    /// Prerequisites of `task` (defensive copy).
    pub fn dependencies_of(&self, task: &TaskId) -> HashSet<TaskId> {
        self.dependencies.get(task).cloned().unwrap_or_default()
    }

    /// Tasks that depend on `task` (defensive copy).
    pub fn dependents_of(&self, task: &TaskId) -> HashSet<TaskId> {
        self.dependents.get(task).cloned().unwrap_or_default()
    }

    /// True iff every prerequisite of `task` is in `completed`.
    pub fn is_ready(&self, task: &TaskId, completed: &HashSet<TaskId>) -> bool {
        self.dependencies
            .get(task)
            .map(|deps| deps.is_subset(completed))
            .unwrap_or(true)
    }

    /// Detect whether any dependency chain loops back on itself.
    ///
    /// Classic three-color depth-first search over the forward edges; a
    /// back-edge to a node still on the recursion stack is a cycle.
    pub fn has_cycle(&self) -> bool {
        let mut colors: HashMap<TaskId, Color> = self
            .dependencies
            .keys()
            .map(|id| (*id, Color::White))
            .collect();

        for node in self.dependencies.keys() {
            if colors[node] == Color::White && self.visit(node, &mut colors) {
                return true;
            }
        }
        false
    }

    fn visit(&self, node: &TaskId, colors: &mut HashMap<TaskId, Color>) -> bool {
        colors.insert(*node, Color::Gray);
        if let Some(deps) = self.dependencies.get(node) {
            for dep in deps {
                match colors.get(dep) {
                    Some(Color::Gray) => return true,
                    Some(Color::White) => {
                        if self.visit(dep, colors) {
                            return true;
                        }
                    }
                    // Black: already fully explored. None: a prerequisite
                    // that is not a node has no outgoing edges.
                    Some(Color::Black) | None => {}
                }
            }
        }
        colors.insert(*node, Color::Black);
        false
    }

    /// Tasks in dependency order via Kahn's algorithm.
    ///
    /// Nodes whose in-degree never reaches zero — members of a cycle, or
    /// dependents of a prerequisite that was never submitted — are omitted
    /// from the result. The returned order is a partial order over the
    /// acyclic remainder, never an error.
    pub fn topological_sort(&self) -> Vec<TaskId> {
        let mut in_degree: HashMap<TaskId, usize> = self
            .dependencies
            .iter()
            .map(|(task, deps)| (*task, deps.len()))
            .collect();

        let mut seeds: Vec<TaskId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        seeds.sort_unstable();

        let mut queue: VecDeque<TaskId> = seeds.into();
        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);

            if let Some(dependents) = self.dependents.get(&id) {
                let mut unlocked = Vec::new();
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            unlocked.push(*dependent);
                        }
                    }
                }
                unlocked.sort_unstable();
                queue.extend(unlocked);
            }
        }

        order
    }
}
