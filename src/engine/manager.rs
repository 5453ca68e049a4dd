// src/engine/manager.rs

//! The manager: keeps the batch system fed with long-running work.
//!
//! Each invocation counts the long-running tasks already queued or running
//! and submits jobs for ready long tasks until `max_queued + extra_queued`
//! is reached. A submitted task is marked `Queued`; the job it starts is an
//! ordinary worker that will later move it to `Assigned`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ConfigFile, FunctionPolicy, ManagerConfig};
use crate::context::ExecutionContext;
use crate::dag::TaskDag;
use crate::errors::Result;
use crate::exec::{JobDescription, Submitter};
use crate::lock::LockFile;
use crate::store::TaskStore;
use crate::task::Task;
use crate::types::{Status, TaskNumber};

/// Summary of one manager invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerReport {
    /// Long-running tasks currently `Assigned`.
    pub running: usize,
    /// Long-running tasks currently `Queued`.
    pub queued: usize,
    /// Ready, unassigned long-running tasks seen before submitting.
    pub ready: usize,
    /// Tasks submitted by this invocation, in submission order.
    pub submitted: Vec<TaskNumber>,
}

pub struct Manager<C: ExecutionContext, S: Submitter> {
    task_file: PathBuf,
    config: ManagerConfig,
    policy: FunctionPolicy,
    context: Arc<C>,
    lock: LockFile,
    submitter: S,
}

impl<C: ExecutionContext, S: Submitter> std::fmt::Debug for Manager<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("task_file", &self.task_file)
            .field("config", &self.config)
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

impl<C: ExecutionContext, S: Submitter> Manager<C, S> {
    pub fn new(
        task_file: impl Into<PathBuf>,
        cfg: &ConfigFile,
        context: Arc<C>,
        submitter: S,
    ) -> Self {
        let task_file = task_file.into();
        let lock = cfg.manager.lockfile.make_lock(&task_file);
        Self {
            task_file,
            config: cfg.manager.clone(),
            policy: cfg.policy().clone(),
            context,
            lock,
            submitter,
        }
    }

    pub fn task_file(&self) -> &Path {
        &self.task_file
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    /// One manager pass, entirely under the task file lock.
    pub async fn run(&mut self) -> Result<ManagerReport> {
        self.lock.acquire().await?;
        self.lock.validate_or_abandon()?;

        let outcome = self.submit_ready().await;
        let released = self.lock.release();
        let report = outcome?;
        released?;

        info!(
            task_file = ?self.task_file,
            running = report.running,
            queued = report.queued,
            ready = report.ready,
            submitted = ?report.submitted,
            "manager finished"
        );
        Ok(report)
    }

    async fn submit_ready(&mut self) -> Result<ManagerReport> {
        let store = TaskStore::open(&self.task_file)?;
        let pending: Vec<Task> = store
            .load_all()?
            .into_iter()
            .filter(|t| t.status().is_not_completed())
            .collect();

        let mut report = ManagerReport::default();
        for task in &pending {
            if !self.policy.is_long(&*self.context, task)? {
                continue;
            }
            match task.status() {
                Status::Assigned => report.running += 1,
                Status::Queued => report.queued += 1,
                _ => {}
            }
        }

        let dag = TaskDag::build(pending, &*self.context)?;
        let mut candidates = Vec::new();
        for task in dag.ready() {
            if task.status() == Status::Unassigned && self.policy.is_long(&*self.context, task)? {
                candidates.push(task.clone());
            }
        }
        report.ready = candidates.len();

        let limit = self.config.max_queued + self.config.extra_queued;
        let budget = limit.saturating_sub(report.running + report.queued);
        debug!(
            limit,
            running = report.running,
            queued = report.queued,
            candidates = candidates.len(),
            budget,
            "manager budget"
        );

        for mut task in candidates.into_iter().take(budget) {
            let submit = self
                .policy
                .submit_for(task.function_id(), &self.config.submit);
            let job = JobDescription {
                task_file: self.task_file.clone(),
                task_number: task.number(),
                function_id: task.function_id().to_string(),
                command: submit.command,
                script: submit.script,
            };

            self.submitter.submit(job).await?;

            task.transition(Status::Queued)?;
            store.update(&task)?;
            info!(task = task.number(), function_id = %task.function_id(), "task queued");
            report.submitted.push(task.number());
        }

        Ok(report)
    }
}
