// src/context/registry.rs

//! Explicit registry of task functions.
//!
//! Functions are registered once at startup under a binding name; task
//! metadata refers to them by that name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::{TaskArgs, TaskResults};
use crate::errors::{Result, SlotdagError};

/// Something that can execute a task.
///
/// Functions run on a blocking thread, outside the scheduler lock.
pub trait TaskFunction: Send + Sync {
    fn call(&self, args: TaskArgs) -> anyhow::Result<TaskResults>;
}

impl<F> TaskFunction for F
where
    F: Fn(TaskArgs) -> anyhow::Result<TaskResults> + Send + Sync,
{
    fn call(&self, args: TaskArgs) -> anyhow::Result<TaskResults> {
        self(args)
    }
}

#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn TaskFunction>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> Result<()>
    where
        F: TaskFunction + 'static,
    {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(SlotdagError::DuplicateFunction(name));
        }
        self.functions.insert(name, Arc::new(function));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn TaskFunction>> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| SlotdagError::UnknownFunction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
