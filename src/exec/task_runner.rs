// src/exec/task_runner.rs

//! Runs a single task function outside the scheduler lock.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::{TaskArgs, TaskFunction, TaskResults};
use crate::task::Task;

/// What happened to a task function invocation.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The function returned, successfully or not.
    Finished(anyhow::Result<TaskResults>),
    /// A termination request arrived before the function returned.
    Interrupted,
}

/// Run `function` on a blocking thread, racing it against `interrupt`.
///
/// If `interrupt` resolves first the outcome is `Interrupted`. The blocking
/// thread cannot be cancelled and keeps running in the background until the
/// process exits; no completion is recorded for it.
pub async fn run_task_function<I>(
    task: &Task,
    function: Arc<dyn TaskFunction>,
    args: TaskArgs,
    interrupt: I,
) -> ExecutionOutcome
where
    I: Future<Output = ()>,
{
    info!(
        task = task.number(),
        function_id = %task.function_id(),
        "starting task function"
    );

    let handle = tokio::task::spawn_blocking(move || function.call(args));

    tokio::select! {
        joined = handle => {
            let result = match joined {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::Error::from(join_err).context("task function panicked")),
            };
            match &result {
                Ok(_) => info!(task = task.number(), "task function finished"),
                Err(err) => warn!(task = task.number(), error = %err, "task function failed"),
            }
            ExecutionOutcome::Finished(result)
        }
        _ = interrupt => {
            warn!(task = task.number(), "termination requested while task was running");
            ExecutionOutcome::Interrupted
        }
    }
}

/// Resolves when the process receives SIGTERM or Ctrl-C.
///
/// Once a handler is registered, tokio keeps it for the rest of the process
/// lifetime, so the default terminate action no longer applies.
pub async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = term.recv() => debug!("received SIGTERM"),
                    _ = ctrl_c() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; listening for Ctrl-C only");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => debug!("received Ctrl-C"),
        Err(err) => {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
