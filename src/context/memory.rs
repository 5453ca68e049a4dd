// src/context/memory.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::context::{ExecutionContext, FunctionRegistry, TaskArgs, TaskFunction, TaskResults};
use crate::errors::{Result, SlotdagError};
use crate::task::{Task, TaskMetadata};
use crate::types::{FunctionId, SlotName, TaskNumber};

/// Static description of a function id for [`InMemoryContext`].
#[derive(Debug, Clone, Default)]
pub struct FunctionSpec {
    pub inputs: Vec<SlotName>,
    pub outputs: Vec<SlotName>,
    pub long: bool,
    /// Registry key; defaults to the function id itself when empty.
    pub binding: String,
    pub args: TaskArgs,
}

/// Per-worker state of the in-memory context: the tasks this worker has
/// reported results for, in order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryState {
    pub completed: Vec<TaskNumber>,
}

/// Reference execution context that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryContext {
    specs: HashMap<FunctionId, FunctionSpec>,
    registry: FunctionRegistry,
    reported: Mutex<Vec<(TaskNumber, TaskResults)>>,
}

impl InMemoryContext {
    pub fn new(registry: FunctionRegistry) -> Self {
        Self {
            specs: HashMap::new(),
            registry,
            reported: Mutex::new(Vec::new()),
        }
    }

    pub fn with_spec(mut self, function_id: impl Into<FunctionId>, spec: FunctionSpec) -> Self {
        self.specs.insert(function_id.into(), spec);
        self
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Results reported so far, in reporting order.
    pub fn reported(&self) -> Vec<(TaskNumber, TaskResults)> {
        self.reported
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn spec(&self, task: &Task) -> Result<&FunctionSpec> {
        self.specs
            .get(task.function_id())
            .ok_or_else(|| SlotdagError::UnknownFunction(task.function_id().to_string()))
    }
}

impl ExecutionContext for InMemoryContext {
    type State = InMemoryState;

    fn initial_state(&self) -> Self::State {
        InMemoryState::default()
    }

    fn resolve_metadata(&self, task: &Task) -> Result<TaskMetadata> {
        let spec = self.spec(task)?;
        let binding = if spec.binding.is_empty() {
            task.function_id().to_string()
        } else {
            spec.binding.clone()
        };
        Ok(TaskMetadata {
            input_slots: spec.inputs.clone(),
            output_slots: spec.outputs.clone(),
            binding,
            long_running: spec.long,
        })
    }

    fn task_function(&self, task: &Task) -> Result<Arc<dyn TaskFunction>> {
        let binding = &self.task_metadata(task)?.binding;
        self.registry.resolve(binding)
    }

    fn args(&self, task: &Task, _state: &Self::State) -> Result<TaskArgs> {
        Ok(self
            .spec(task)?
            .args
            .clone()
            .kwarg("task_number", task.number()))
    }

    fn report_results(&self, task: &Task, results: TaskResults, state: &mut Self::State) -> Result<()> {
        state.completed.push(task.number());
        self.reported
            .lock()
            .map_err(|_| anyhow::anyhow!("result log poisoned"))?
            .push((task.number(), results));
        Ok(())
    }
}
