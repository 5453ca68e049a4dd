// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::trace;

use crate::context::ExecutionContext;
use crate::errors::{Result, SlotdagError};
use crate::task::Task;
use crate::types::{SlotName, TaskNumber};

/// Dependency graph over a list of not-completed tasks.
///
/// Edge `a -> b` means `a` must complete before `b` may run. Node order is
/// the order of the input task list, which is the submission order.
#[derive(Debug, Clone)]
pub struct TaskDag {
    graph: DiGraph<Task, ()>,
    index: HashMap<TaskNumber, NodeIndex>,
}

impl TaskDag {
    /// Build the DAG for `tasks`, in order.
    ///
    /// Each slot remembers only its most recent producer. A task depends on
    /// the last task before it that wrote each of its input slots; earlier
    /// writers of the same slot are not dependencies. Inputs are wired before
    /// the task registers its own outputs, so a task that rewrites a slot it
    /// reads depends on the previous writer rather than on itself.
    ///
    /// Edges only ever point from an earlier task to a later one, so the
    /// result is acyclic by construction.
    pub fn build<C>(tasks: Vec<Task>, ctx: &C) -> Result<Self>
    where
        C: ExecutionContext + ?Sized,
    {
        let mut graph = DiGraph::with_capacity(tasks.len(), tasks.len());
        let mut index = HashMap::with_capacity(tasks.len());
        let mut last_producer: HashMap<SlotName, NodeIndex> = HashMap::new();

        for task in tasks {
            let inputs = ctx.input_slots(&task)?;
            let outputs = ctx.output_slots(&task)?;
            let number = task.number();

            let node = graph.add_node(task);
            index.insert(number, node);

            for slot in &inputs {
                if let Some(&producer) = last_producer.get(slot) {
                    graph.update_edge(producer, node, ());
                    trace!(task = number, slot = %slot, producer = graph[producer].number(), "slot dependency");
                }
            }

            for slot in outputs {
                last_producer.insert(slot, node);
            }
        }

        Ok(Self { graph, index })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All tasks in node (submission) order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_weights()
    }

    pub fn task(&self, number: TaskNumber) -> Option<&Task> {
        self.index.get(&number).map(|&node| &self.graph[node])
    }

    /// Every edge as `(producer, consumer)` task numbers, sorted.
    pub fn edges(&self) -> Vec<(TaskNumber, TaskNumber)> {
        let mut edges: Vec<(TaskNumber, TaskNumber)> = self
            .graph
            .edge_references()
            .map(|e| (self.graph[e.source()].number(), self.graph[e.target()].number()))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Tasks that must complete before `number` can run.
    pub fn dependencies_of(&self, number: TaskNumber) -> Vec<TaskNumber> {
        self.neighbours(number, Direction::Incoming)
    }

    /// Tasks waiting on `number`.
    pub fn dependents_of(&self, number: TaskNumber) -> Vec<TaskNumber> {
        self.neighbours(number, Direction::Outgoing)
    }

    fn neighbours(&self, number: TaskNumber, direction: Direction) -> Vec<TaskNumber> {
        let Some(&node) = self.index.get(&number) else {
            return Vec::new();
        };
        let mut out: Vec<TaskNumber> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n].number())
            .collect();
        out.sort_unstable();
        out
    }

    /// Tasks with no incoming edges, in node order.
    ///
    /// Since the graph only contains not-completed tasks, these are the tasks
    /// with no unresolved dependencies.
    pub fn zero_in_degree(&self) -> Vec<&Task> {
        self.graph
            .node_indices()
            .filter(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|n| &self.graph[n])
            .collect()
    }

    /// The ready set: unblocked tasks whose status is available.
    pub fn ready(&self) -> Vec<&Task> {
        self.zero_in_degree()
            .into_iter()
            .filter(|t| t.status().is_available())
            .collect()
    }

    /// Task numbers in a dependency-respecting order.
    pub fn topological_order(&self) -> Result<Vec<TaskNumber>> {
        let order = toposort(&self.graph, None).map_err(|cycle| {
            SlotdagError::Other(anyhow::anyhow!(
                "cycle in task DAG involving task {}",
                self.graph[cycle.node_id()].number()
            ))
        })?;
        Ok(order.into_iter().map(|n| self.graph[n].number()).collect())
    }
}
