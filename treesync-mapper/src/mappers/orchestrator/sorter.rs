//! Dependency sort of orchestration phases.
//!
//! Phases are added under a string key (a directory name locally, an id
//! remotely) with the keys they depend on. Sorting is a depth-first walk in
//! declaration order over an index-based graph: every phase lands after its
//! dependencies, independent phases keep their declared order.

use std::collections::HashMap;

use treesync_core::orchestration::Phase;
use treesync_core::{ConfigKey, ErrorItem, MultiError, PhaseKey, TaskKey};

struct Node {
    key: String,
    phase: Phase,
    depends_on: Vec<String>,
}

pub struct PhasesSorter {
    config: ConfigKey,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    errors: MultiError,
}

/// Sorted phases plus dangling dependencies and cycles. Phases are empty
/// when a cycle was found.
#[derive(Debug, Default)]
pub struct SortedPhases {
    pub phases: Vec<Phase>,
    pub errors: MultiError,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    OnStack,
    Done,
}

impl PhasesSorter {
    pub fn new(config: ConfigKey) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            index: HashMap::new(),
            errors: MultiError::new(),
        }
    }

    /// Adds a phase. A repeated key is reported and the first phase kept.
    pub fn add(&mut self, key: impl Into<String>, phase: Phase, depends_on: Vec<String>) {
        let key = key.into();
        if self.index.contains_key(&key) {
            self.errors
                .push(format!("duplicate phase \"{key}\", \"{}\" ignored", phase.name));
            return;
        }
        self.index.insert(key.clone(), self.nodes.len());
        self.nodes.push(Node {
            key,
            phase,
            depends_on,
        });
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Key of the phase added last.
    pub fn last_key(&self) -> Option<&str> {
        self.nodes.last().map(|n| n.key.as_str())
    }

    /// Adds a task to a phase added before.
    pub fn add_task(&mut self, phase_key: &str, task: treesync_core::orchestration::Task) -> bool {
        match self.index.get(phase_key) {
            Some(&i) => {
                self.nodes[i].phase.tasks.push(task);
                true
            }
            None => false,
        }
    }

    pub fn sort(mut self) -> SortedPhases {
        let mut errors = std::mem::take(&mut self.errors);

        let mut edges: Vec<Vec<usize>> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut deps = Vec::new();
            for dep in &node.depends_on {
                match self.index.get(dep) {
                    Some(&i) => deps.push(i),
                    None => errors.push(format!(
                        "missing phase \"{dep}\", referenced from \"{}\"",
                        node.key
                    )),
                }
            }
            edges.push(deps);
        }

        let mut walk = Walk {
            edges: &edges,
            marks: vec![Mark::New; self.nodes.len()],
            stack: Vec::new(),
            order: Vec::new(),
            cycles: Vec::new(),
        };
        for i in 0..self.nodes.len() {
            walk.visit(i);
        }

        if !walk.cycles.is_empty() {
            let mut chains = MultiError::new();
            for cycle in &walk.cycles {
                let chain: Vec<String> = cycle
                    .iter()
                    .map(|&i| format!("\"{}\"", self.nodes[i].key))
                    .collect();
                chains.push(chain.join(" -> "));
            }
            errors.push_item(ErrorItem::with_causes(
                "found cycles in phases \"dependsOn\"",
                chains,
            ));
            return SortedPhases {
                phases: Vec::new(),
                errors,
            };
        }

        let mut position = vec![0; self.nodes.len()];
        for (pos, &i) in walk.order.iter().enumerate() {
            position[i] = pos;
        }

        let order = walk.order;
        let mut slots: Vec<Option<Node>> = self.nodes.into_iter().map(Some).collect();
        let mut phases = Vec::with_capacity(order.len());
        for (pos, &i) in order.iter().enumerate() {
            let Some(node) = slots[i].take() else {
                continue;
            };
            let mut phase = node.phase;
            phase.key = PhaseKey::new(&self.config, pos);
            for (index, task) in phase.tasks.iter_mut().enumerate() {
                task.key = TaskKey {
                    phase: phase.key.clone(),
                    index,
                };
            }
            let mut deps: Vec<usize> = edges[i].iter().map(|&d| position[d]).collect();
            deps.sort_unstable();
            deps.dedup();
            phase.depends_on = deps
                .into_iter()
                .map(|d| PhaseKey::new(&self.config, d))
                .collect();
            phases.push(phase);
        }

        SortedPhases { phases, errors }
    }
}

struct Walk<'a> {
    edges: &'a [Vec<usize>],
    marks: Vec<Mark>,
    stack: Vec<usize>,
    order: Vec<usize>,
    cycles: Vec<Vec<usize>>,
}

impl Walk<'_> {
    fn visit(&mut self, i: usize) {
        if self.marks[i] != Mark::New {
            return;
        }
        self.marks[i] = Mark::OnStack;
        self.stack.push(i);
        for &dep in &self.edges[i] {
            match self.marks[dep] {
                Mark::New => self.visit(dep),
                Mark::OnStack => {
                    if let Some(start) = self.stack.iter().position(|&s| s == dep) {
                        let mut cycle = self.stack[start..].to_vec();
                        cycle.push(dep);
                        self.cycles.push(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        self.stack.pop();
        self.marks[i] = Mark::Done;
        self.order.push(i);
    }
}
