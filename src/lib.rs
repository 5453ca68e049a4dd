// src/lib.rs

pub mod config;
pub mod context;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod lock;
pub mod logging;
pub mod store;
pub mod task;
pub mod types;

use std::path::Path;

use tracing::info;

use crate::config::LockSettings;
use crate::errors::Result;
use crate::store::TaskStore;

pub use crate::config::ConfigFile;
pub use crate::context::{ExecutionContext, FunctionRegistry, TaskArgs, TaskFunction, TaskResults};
pub use crate::engine::{CycleOutcome, Manager, ManagerReport, Worker};
pub use crate::errors::SlotdagError;
pub use crate::task::Task;
pub use crate::types::{Status, TaskNumber};

/// Create the task file for a new job: one `Unassigned` task per function
/// id, numbered in the given order.
///
/// The table is written under the task file lock so a worker started early
/// never sees a half-populated table.
pub async fn create_job<I, S>(task_file: &Path, function_ids: I, lock: &LockSettings) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let function_ids: Vec<String> = function_ids.into_iter().map(Into::into).collect();
    let count = function_ids.len();

    let mut lock = lock.make_lock(task_file);
    lock.with_lock(|| TaskStore::create(task_file, function_ids).map(|_| ()))
        .await?;

    info!(task_file = ?task_file, count, "created job");
    Ok(())
}
