// src/config/policy.rs

use std::collections::HashMap;

use crate::config::model::{FunctionConfig, SubmitConfig};
use crate::context::ExecutionContext;
use crate::errors::Result;
use crate::task::Task;

/// Per-function overrides resolved once from `[[functions]]`.
#[derive(Debug, Clone, Default)]
pub struct FunctionPolicy {
    fast: HashMap<String, bool>,
    submit: HashMap<String, SubmitConfig>,
}

impl FunctionPolicy {
    pub fn from_functions(functions: &[FunctionConfig]) -> Self {
        let mut policy = Self::default();
        for f in functions {
            if let Some(fast) = f.fast {
                policy.fast.insert(f.name.clone(), fast);
            }
            if let Some(submit) = &f.submit {
                policy.submit.insert(f.name.clone(), submit.clone());
            }
        }
        policy
    }

    /// Long-running classification: the configured override if any,
    /// otherwise whatever the context says.
    pub fn is_long<C>(&self, ctx: &C, task: &Task) -> Result<bool>
    where
        C: ExecutionContext + ?Sized,
    {
        match self.fast.get(task.function_id()) {
            Some(&fast) => Ok(!fast),
            None => ctx.is_long(task),
        }
    }

    /// Submission parameters for `function_id`, field by field falling back
    /// to `default`.
    pub fn submit_for(&self, function_id: &str, default: &SubmitConfig) -> SubmitConfig {
        match self.submit.get(function_id) {
            Some(over) => SubmitConfig {
                command: if over.command.is_empty() {
                    default.command.clone()
                } else {
                    over.command.clone()
                },
                script: if over.script.is_empty() {
                    default.script.clone()
                } else {
                    over.script.clone()
                },
            },
            None => default.clone(),
        }
    }
}
