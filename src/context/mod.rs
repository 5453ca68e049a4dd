// src/context/mod.rs

//! The execution context: the domain-specific side of the scheduler.
//!
//! A context tells the scheduler, for each task:
//! - which slots it reads and writes (this drives the DAG),
//! - whether it is long-running (this drives admission control and
//!   submission),
//! - which function executes it and with what arguments,
//! - what to do with its results.
//!
//! - [`registry`] maps binding names to executable functions.
//! - [`memory`] is an in-memory reference context used by tests.

pub mod memory;
pub mod registry;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::task::{Task, TaskMetadata};
use crate::types::SlotName;

pub use memory::{FunctionSpec, InMemoryContext, InMemoryState};
pub use registry::{FunctionRegistry, TaskFunction};

/// Results returned by a task function.
pub type TaskResults = serde_json::Value;

/// Arguments a task function is invoked with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskArgs {
    #[serde(default)]
    pub positional: Vec<serde_json::Value>,
    #[serde(default)]
    pub keyword: BTreeMap<String, serde_json::Value>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.keyword.insert(key.into(), value.into());
        self
    }
}

/// Domain-specific mapping from tasks to slots, functions and classification.
///
/// Implementors only need [`resolve_metadata`](ExecutionContext::resolve_metadata)
/// for the slot and classification queries; the provided methods go through
/// the task's metadata cache so each task is resolved at most once.
pub trait ExecutionContext: Send + Sync {
    /// Opaque state threaded through a worker's lifetime.
    type State: Send;

    fn initial_state(&self) -> Self::State;

    /// Compute the metadata of a task from scratch.
    fn resolve_metadata(&self, task: &Task) -> Result<TaskMetadata>;

    fn task_function(&self, task: &Task) -> Result<Arc<dyn TaskFunction>>;

    fn args(&self, task: &Task, state: &Self::State) -> Result<TaskArgs>;

    fn report_results(&self, task: &Task, results: TaskResults, state: &mut Self::State) -> Result<()>;

    /// Cached metadata for `task`, resolving it on first use.
    fn task_metadata<'t>(&self, task: &'t Task) -> Result<&'t TaskMetadata> {
        if let Some(metadata) = task.metadata() {
            return Ok(metadata);
        }
        let metadata = self.resolve_metadata(task)?;
        task.set_metadata(metadata)
    }

    fn input_slots(&self, task: &Task) -> Result<Vec<SlotName>> {
        Ok(self.task_metadata(task)?.input_slots.clone())
    }

    fn output_slots(&self, task: &Task) -> Result<Vec<SlotName>> {
        Ok(self.task_metadata(task)?.output_slots.clone())
    }

    fn is_long(&self, task: &Task) -> Result<bool> {
        Ok(self.task_metadata(task)?.long_running)
    }
}
