// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::policy::FunctionPolicy;
use crate::lock::LockFile;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [runner]
/// consume_fast_tasks = true
/// max_long_tasks = 2
///
/// [runner.lockfile]
/// timeout = 300.0
/// delay = 1.0
///
/// [manager]
/// max_queued = 4
/// extra_queued = 1
///
/// [manager.submit]
/// command = "sbatch"
/// script = "#!/bin/sh\nrun-worker {task_file}\n"
///
/// [[functions]]
/// name = "simulate"
/// fast = false
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub manager: ManagerConfig,

    /// Per-function-id overrides from `[[functions]]`.
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub runner: RunnerConfig,
    pub manager: ManagerConfig,
    pub functions: Vec<FunctionConfig>,
    policy: FunctionPolicy,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        runner: RunnerConfig,
        manager: ManagerConfig,
        functions: Vec<FunctionConfig>,
    ) -> Self {
        let policy = FunctionPolicy::from_functions(&functions);
        Self {
            runner,
            manager,
            functions,
            policy,
        }
    }

    pub fn policy(&self) -> &FunctionPolicy {
        &self.policy
    }
}

/// Lock timing, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LockSettings {
    pub timeout: f64,
    pub delay: f64,
}

impl LockSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay)
    }

    /// Lock guarding `task_file` with these timings.
    pub fn make_lock(&self, task_file: impl Into<PathBuf>) -> LockFile {
        LockFile::new(task_file, self.timeout(), self.delay())
    }
}

fn default_runner_lockfile() -> LockSettings {
    LockSettings {
        timeout: 300.0,
        delay: 1.0,
    }
}

fn default_manager_lockfile() -> LockSettings {
    LockSettings {
        timeout: 60.0,
        delay: 1.0,
    }
}

fn default_consume_fast_tasks() -> bool {
    true
}

fn default_max_long_tasks() -> usize {
    2
}

/// `[runner]` section: behaviour of worker processes.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Keep running cycles until no task is available, instead of exactly
    /// one cycle per invocation.
    #[serde(default = "default_consume_fast_tasks")]
    pub consume_fast_tasks: bool,

    /// How many long-running tasks one worker may own at a time.
    #[serde(default = "default_max_long_tasks")]
    pub max_long_tasks: usize,

    #[serde(default = "default_runner_lockfile")]
    pub lockfile: LockSettings,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            consume_fast_tasks: default_consume_fast_tasks(),
            max_long_tasks: default_max_long_tasks(),
            lockfile: default_runner_lockfile(),
        }
    }
}

/// `[manager]` section: submission of long-running work to a batch system.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Upper bound on long-running tasks queued or running at once.
    #[serde(default)]
    pub max_queued: usize,

    /// Headroom on top of `max_queued`, to absorb submission latency.
    #[serde(default)]
    pub extra_queued: usize,

    #[serde(default)]
    pub submit: SubmitConfig,

    #[serde(default = "default_manager_lockfile")]
    pub lockfile: LockSettings,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_queued: 0,
            extra_queued: 0,
            submit: SubmitConfig::default(),
            lockfile: default_manager_lockfile(),
        }
    }
}

/// How to hand a job to the batch system.
///
/// `script` may contain `{task_file}`, `{task_number}` and `{function_id}`
/// placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubmitConfig {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub script: String,
}

/// `[[functions]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionConfig {
    /// Function id this entry applies to.
    pub name: String,

    /// Force the classification: `true` for inline execution, `false` for
    /// long-running. If absent, the execution context decides.
    #[serde(default)]
    pub fast: Option<bool>,

    /// Submission override; empty fields fall back to `[manager.submit]`.
    #[serde(default)]
    pub submit: Option<SubmitConfig>,
}
