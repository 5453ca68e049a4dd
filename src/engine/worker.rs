// src/engine/worker.rs

//! The worker: picks, assigns, executes and completes tasks.
//!
//! One cycle:
//!
//! 1. acquire the lock, reload the task table, reclaim an aborted task or
//!    select a ready one from a freshly built DAG, check admission, mark it
//!    `Assigned`, release the lock;
//! 2. run the task function with the lock released;
//! 3. acquire the lock again to report the results and record `Completed`
//!    (or record `Failed`).
//!
//! Only the bracketing bookkeeping is serialized; execution of distinct
//! tasks by different workers overlaps freely.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::{ConfigFile, FunctionPolicy, RunnerConfig};
use crate::context::{ExecutionContext, TaskArgs, TaskFunction, TaskResults};
use crate::dag::{FirstReady, TaskDag, TaskSelector};
use crate::engine::abort::{AbortPolicy, NoAbortTracking};
use crate::engine::session::WorkerSession;
use crate::errors::{Result, SlotdagError};
use crate::exec::{ExecutionOutcome, run_task_function, termination_signal};
use crate::lock::LockFile;
use crate::store::TaskStore;
use crate::task::Task;
use crate::types::{Status, TaskNumber};

/// Result of a single worker cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No task was available.
    Idle,
    /// A candidate was found but admission control turned it down; its
    /// status was left untouched.
    Refused(TaskNumber),
    /// The task ran and was recorded as completed.
    Completed(TaskNumber),
}

/// Decision taken under the lock at the start of a cycle.
enum Claim {
    Idle,
    Refused(TaskNumber),
    Assigned(Assignment),
}

struct Assignment {
    task: Task,
    function: Arc<dyn TaskFunction>,
    args: TaskArgs,
}

pub struct Worker<C: ExecutionContext> {
    task_file: PathBuf,
    config: RunnerConfig,
    policy: FunctionPolicy,
    context: Arc<C>,
    lock: LockFile,
    session: WorkerSession<C::State>,
    selector: Box<dyn TaskSelector>,
    aborts: Box<dyn AbortPolicy>,
    interrupt: Option<Arc<Notify>>,
    listen_for_signals: bool,
}

impl<C: ExecutionContext> std::fmt::Debug for Worker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("task_file", &self.task_file)
            .field("config", &self.config)
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

impl<C: ExecutionContext> Worker<C> {
    pub fn new(task_file: impl Into<PathBuf>, cfg: &ConfigFile, context: Arc<C>) -> Self {
        let task_file = task_file.into();
        let lock = cfg.runner.lockfile.make_lock(&task_file);
        let session = WorkerSession::new(context.initial_state(), cfg.runner.max_long_tasks);

        Self {
            task_file,
            config: cfg.runner.clone(),
            policy: cfg.policy().clone(),
            context,
            lock,
            session,
            selector: Box::new(FirstReady),
            aborts: Box::new(NoAbortTracking),
            interrupt: None,
            listen_for_signals: true,
        }
    }

    pub fn with_selector(mut self, selector: impl TaskSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    pub fn with_abort_policy(mut self, aborts: impl AbortPolicy + 'static) -> Self {
        self.aborts = Box::new(aborts);
        self
    }

    /// Treat a notification on `interrupt` like a termination signal.
    pub fn with_interrupt(mut self, interrupt: Arc<Notify>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Do not install SIGTERM / Ctrl-C handlers around task execution.
    pub fn without_signal_handlers(mut self) -> Self {
        self.listen_for_signals = false;
        self
    }

    pub fn task_file(&self) -> &Path {
        &self.task_file
    }

    pub fn session(&self) -> &WorkerSession<C::State> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut WorkerSession<C::State> {
        &mut self.session
    }

    /// Run one cycle, or keep cycling while tasks complete if
    /// `consume_fast_tasks` is set.
    ///
    /// Returns the numbers of the tasks completed by this call.
    pub async fn run(&mut self) -> Result<Vec<TaskNumber>> {
        let mut completed = Vec::new();

        loop {
            match self.run_one_task().await? {
                CycleOutcome::Completed(number) => {
                    completed.push(number);
                    if !self.config.consume_fast_tasks {
                        break;
                    }
                }
                CycleOutcome::Idle | CycleOutcome::Refused(_) => break,
            }
        }

        info!(task_file = ?self.task_file, ?completed, "worker finished");
        Ok(completed)
    }

    /// One full scheduling cycle.
    pub async fn run_one_task(&mut self) -> Result<CycleOutcome> {
        let assignment = match self.claim_next_task().await? {
            Claim::Idle => {
                debug!(task_file = ?self.task_file, "no task available");
                return Ok(CycleOutcome::Idle);
            }
            Claim::Refused(number) => return Ok(CycleOutcome::Refused(number)),
            Claim::Assigned(assignment) => assignment,
        };

        let Assignment {
            mut task,
            function,
            args,
        } = assignment;
        let number = task.number();

        let interrupt = wait_for_interrupt(self.interrupt.clone(), self.listen_for_signals);
        match run_task_function(&task, function, args, interrupt).await {
            ExecutionOutcome::Interrupted => {
                self.session.release(number);
                self.aborts.record_interrupted(&task)?;
                Err(SlotdagError::Interrupted(number))
            }
            ExecutionOutcome::Finished(Ok(results)) => {
                let finished = self.complete_task(&mut task, results).await;
                self.session.release(number);
                finished?;
                info!(task = number, "task completed");
                Ok(CycleOutcome::Completed(number))
            }
            ExecutionOutcome::Finished(Err(source)) => {
                let finished = self.fail_task(&mut task).await;
                self.session.release(number);
                finished?;
                Err(SlotdagError::TaskExecution {
                    number,
                    function_id: task.function_id().to_string(),
                    source,
                })
            }
        }
    }

    /// Under the lock: choose a candidate, check admission and assign it.
    async fn claim_next_task(&mut self) -> Result<Claim> {
        let task_file = &self.task_file;
        let context = &*self.context;
        let policy = &self.policy;
        let selector = &*self.selector;
        let aborts = &*self.aborts;
        let session = &mut self.session;

        self.lock
            .with_lock(|| {
                let store = TaskStore::open(task_file)?;
                let pending: Vec<Task> = store
                    .load_all()?
                    .into_iter()
                    .filter(|t| t.status().is_not_completed())
                    .collect();

                // Orphan recovery takes priority over fresh scheduling.
                let aborted = aborts.find_aborted(&pending)?;
                let candidate = match aborted.first() {
                    Some(&number) => {
                        info!(task = number, "reclaiming aborted task");
                        pending.iter().find(|t| t.number() == number).cloned()
                    }
                    None => {
                        let dag = TaskDag::build(pending, context)?;
                        let ready = dag.ready();
                        debug!(
                            pending = dag.len(),
                            ready = ready.len(),
                            "rebuilt task DAG"
                        );
                        selector.select(&ready).cloned()
                    }
                };

                let Some(mut task) = candidate else {
                    return Ok(Claim::Idle);
                };

                let is_long = policy.is_long(context, &task)?;
                if !session.can_admit(is_long) {
                    info!(
                        task = task.number(),
                        long_taken = session.long_taken(),
                        max_long_tasks = session.max_long_tasks(),
                        "refusing long-running task; worker used its long-task budget"
                    );
                    return Ok(Claim::Refused(task.number()));
                }

                let function = context.task_function(&task)?;
                let args = context.args(&task, session.state())?;

                task.transition(Status::Assigned)?;
                store.update(&task)?;
                aborts.clear(&task)?;
                session.claim(task.number(), is_long);

                info!(
                    task = task.number(),
                    function_id = %task.function_id(),
                    long = is_long,
                    "assigned task"
                );
                Ok(Claim::Assigned(Assignment {
                    task,
                    function,
                    args,
                }))
            })
            .await
    }

    /// Under the lock: report the results, then record `Completed`.
    ///
    /// If reporting fails the task stays `Assigned` in the table.
    async fn complete_task(&mut self, task: &mut Task, results: TaskResults) -> Result<()> {
        let task_file = &self.task_file;
        let context = &*self.context;
        let state = self.session.state_mut();
        self.lock
            .with_lock(|| {
                let store = TaskStore::open(task_file)?;
                context.report_results(task, results, state)?;
                task.transition(Status::Completed)?;
                store.update(task)
            })
            .await
    }

    /// Under the lock: record `Failed`.
    async fn fail_task(&mut self, task: &mut Task) -> Result<()> {
        let task_file = &self.task_file;
        self.lock
            .with_lock(|| {
                let store = TaskStore::open(task_file)?;
                task.transition(Status::Failed)?;
                store.update(task)?;
                warn!(task = task.number(), "task marked failed");
                Ok(())
            })
            .await
    }
}

/// Resolves on a notification or, if enabled, a termination signal.
async fn wait_for_interrupt(notify: Option<Arc<Notify>>, signals: bool) {
    let notified = async move {
        match notify {
            Some(n) => n.notified().await,
            None => std::future::pending::<()>().await,
        }
    };
    let signalled = async move {
        if signals {
            termination_signal().await
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = notified => {}
        _ = signalled => {}
    }
}
