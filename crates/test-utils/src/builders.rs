#![allow(dead_code)]

use slotdag::config::{
    ConfigFile, FunctionConfig, LockSettings, RawConfigFile, SubmitConfig,
};
use slotdag::context::{FunctionRegistry, FunctionSpec, InMemoryContext, TaskArgs, TaskResults};

/// Lock timing suitable for tests: short timeout, fast polling.
pub fn fast_lock() -> LockSettings {
    LockSettings {
        timeout: 2.0,
        delay: 0.01,
    }
}

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the defaults with both lock sections replaced by
/// [`fast_lock`].
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.runner.lockfile = fast_lock();
        config.manager.lockfile = fast_lock();
        Self { config }
    }

    pub fn consume_fast_tasks(mut self, val: bool) -> Self {
        self.config.runner.consume_fast_tasks = val;
        self
    }

    pub fn max_long_tasks(mut self, n: usize) -> Self {
        self.config.runner.max_long_tasks = n;
        self
    }

    pub fn max_queued(mut self, n: usize) -> Self {
        self.config.manager.max_queued = n;
        self
    }

    pub fn extra_queued(mut self, n: usize) -> Self {
        self.config.manager.extra_queued = n;
        self
    }

    pub fn submit(mut self, command: &str, script: &str) -> Self {
        self.config.manager.submit = SubmitConfig {
            command: command.to_string(),
            script: script.to_string(),
        };
        self
    }

    pub fn runner_lock(mut self, timeout: f64, delay: f64) -> Self {
        self.config.runner.lockfile = LockSettings { timeout, delay };
        self
    }

    pub fn with_function(mut self, function: FunctionConfig) -> Self {
        self.config.functions.push(function);
        self
    }

    /// Force `name` to be fast (`true`) or long-running (`false`).
    pub fn function_fast(self, name: &str, fast: bool) -> Self {
        self.with_function(FunctionConfig {
            name: name.to_string(),
            fast: Some(fast),
            submit: None,
        })
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `InMemoryContext`: declares function ids with their slots and
/// registers their implementations in one go.
pub struct ContextBuilder {
    registry: FunctionRegistry,
    specs: Vec<(String, FunctionSpec)>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            registry: FunctionRegistry::new(),
            specs: Vec::new(),
        }
    }

    /// Declare a function id that reads `inputs`, writes `outputs` and
    /// returns `{"function": <id>, "task_number": <n>}`.
    pub fn function(self, id: &str, inputs: &[&str], outputs: &[&str], long: bool) -> Self {
        let name = id.to_string();
        self.function_with(id, inputs, outputs, long, move |args: TaskArgs| {
            Ok(serde_json::json!({
                "function": name,
                "task_number": args.keyword.get("task_number").cloned(),
            }))
        })
    }

    /// Declare a function id with a custom implementation.
    pub fn function_with<F>(
        mut self,
        id: &str,
        inputs: &[&str],
        outputs: &[&str],
        long: bool,
        f: F,
    ) -> Self
    where
        F: Fn(TaskArgs) -> anyhow::Result<TaskResults> + Send + Sync + 'static,
    {
        self.registry
            .register(id, f)
            .expect("function registered twice in ContextBuilder");
        self.specs.push((
            id.to_string(),
            FunctionSpec {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                outputs: outputs.iter().map(|s| s.to_string()).collect(),
                long,
                ..FunctionSpec::default()
            },
        ));
        self
    }

    /// Declare slots for a function id without registering an implementation.
    pub fn spec_only(mut self, id: &str, inputs: &[&str], outputs: &[&str], long: bool) -> Self {
        self.specs.push((
            id.to_string(),
            FunctionSpec {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                outputs: outputs.iter().map(|s| s.to_string()).collect(),
                long,
                ..FunctionSpec::default()
            },
        ));
        self
    }

    pub fn build(self) -> InMemoryContext {
        self.specs
            .into_iter()
            .fold(InMemoryContext::new(self.registry), |ctx, (id, spec)| {
                ctx.with_spec(id, spec)
            })
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
