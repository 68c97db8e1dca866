//! Task graph - named staging steps and their dependency edges.
//!
//! Steps live in a petgraph arena with an edge from each step to each of its
//! dependencies. Dependencies may be named before they are registered; such
//! names get a placeholder node until the step arrives. Registration rejects
//! anything that would close a cycle, so the graph is always a DAG.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::core::error::StageError;
use crate::core::step::StagingStep;

/// The step dependency graph.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    /// Step names; an edge `a -> b` means `a` depends on `b`
    graph: DiGraph<String, ()>,

    /// Map from step name to node index (includes placeholders)
    nodes: HashMap<String, NodeIndex>,

    /// Registered steps
    steps: HashMap<String, StagingStep>,

    /// Declaration order of registered steps
    seq: HashMap<String, usize>,
}

impl TaskGraph {
    pub fn new() -> Self {
        TaskGraph::default()
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Register a step.
    ///
    /// Fails without modifying the graph if the name is taken or if any of
    /// the step's dependency edges would close a cycle.
    pub fn register_step(&mut self, step: StagingStep) -> Result<(), StageError> {
        if self.steps.contains_key(&step.name) {
            return Err(StageError::DuplicateStep { name: step.name });
        }

        for dep in &step.depends_on {
            if *dep == step.name {
                return Err(StageError::CyclicDependency {
                    step: step.name.clone(),
                    cycle: vec![step.name.clone(), step.name.clone()],
                });
            }

            if let (Some(&node), Some(&dep_node)) = (self.nodes.get(&step.name), self.nodes.get(dep))
            {
                if has_path_connecting(&self.graph, dep_node, node, None) {
                    let mut cycle = vec![step.name.clone()];
                    cycle.extend(self.path_between(dep_node, node));
                    return Err(StageError::CyclicDependency {
                        step: step.name.clone(),
                        cycle,
                    });
                }
            }
        }

        let node = self.node(&step.name);
        for dep in &step.depends_on {
            let dep_node = self.node(dep);
            if !self.graph.contains_edge(node, dep_node) {
                self.graph.add_edge(node, dep_node, ());
            }
        }

        tracing::debug!("registered step `{}`", step.name);
        self.seq.insert(step.name.clone(), self.steps.len());
        self.steps.insert(step.name.clone(), step);
        Ok(())
    }

    /// Shortest dependency path from `from` to `to`, both inclusive.
    fn path_between(&self, from: NodeIndex, to: NodeIndex) -> Vec<String> {
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = HashSet::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                break;
            }
            for next in self.graph.neighbors(current) {
                if seen.insert(next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        let mut path = vec![self.graph[to].clone()];
        let mut current = to;
        while let Some(&prev) = parent.get(&current) {
            path.push(self.graph[prev].clone());
            current = prev;
        }
        path.reverse();
        path
    }

    /// Get a registered step.
    pub fn get(&self, name: &str) -> Option<&StagingStep> {
        self.steps.get(name)
    }

    /// Check if a step is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Registered step names in declaration order.
    pub fn step_names(&self) -> Vec<String> {
        let mut names: Vec<&String> = self.steps.keys().collect();
        names.sort_by_key(|name| self.seq[*name]);
        names.into_iter().cloned().collect()
    }

    /// Execution order for `targets` and everything they depend on.
    ///
    /// Dependencies come first; among independent steps, declaration order
    /// wins.
    pub fn resolve(&self, targets: &[String]) -> Result<Vec<&StagingStep>, StageError> {
        for target in targets {
            if !self.steps.contains_key(target) {
                return Err(StageError::UnknownStep {
                    name: target.clone(),
                    referenced_by: None,
                    available: self.step_names(),
                });
            }
        }

        // Transitive closure
        let mut closure: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(&str, Option<&str>)> =
            targets.iter().map(|t| (t.as_str(), None)).collect();

        while let Some((name, referenced_by)) = stack.pop() {
            if !closure.insert(name) {
                continue;
            }
            let step = self.steps.get(name).ok_or_else(|| StageError::UnknownStep {
                name: name.to_string(),
                referenced_by: referenced_by.map(str::to_string),
                available: self.step_names(),
            })?;
            for dep in &step.depends_on {
                stack.push((dep.as_str(), Some(step.name.as_str())));
            }
        }

        // Kahn's algorithm, ready set keyed by declaration order
        let mut pending: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut ready: BTreeMap<usize, &str> = BTreeMap::new();

        for &name in &closure {
            let step = &self.steps[name];
            pending.insert(name, step.depends_on.len());
            if step.depends_on.is_empty() {
                ready.insert(self.seq[name], name);
            }
            for dep in &step.depends_on {
                dependents.entry(dep.as_str()).or_default().push(name);
            }
        }

        let mut order = Vec::with_capacity(closure.len());
        while let Some((_, name)) = ready.pop_first() {
            order.push(&self.steps[name]);
            for &dependent in dependents.get(name).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(self.seq[dependent], dependent);
                    }
                }
            }
        }

        Ok(order)
    }

    /// Execution order for every registered step.
    pub fn resolve_all(&self) -> Result<Vec<&StagingStep>, StageError> {
        self.resolve(&self.step_names())
    }
}
