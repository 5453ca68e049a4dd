#![allow(dead_code)]

use std::path::PathBuf;

use slotdag::store::TaskStore;
use slotdag::task::Task;
use slotdag::types::{Status, TaskNumber};
use tempfile::TempDir;

pub use slotdag_test_utils::{init_tracing, with_timeout};

/// A fresh temp directory and the path of a task file inside it.
///
/// Keep the `TempDir` alive for the duration of the test.
pub fn task_file() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("tasks.db");
    (dir, path)
}

/// Create a task file with one task per function id.
pub fn job(function_ids: &[&str]) -> (TempDir, PathBuf) {
    let (dir, path) = task_file();
    TaskStore::create(&path, function_ids.iter().copied()).expect("create task table");
    (dir, path)
}

pub fn statuses(path: &PathBuf) -> Vec<(TaskNumber, Status)> {
    TaskStore::open(path)
        .expect("open task table")
        .load_all()
        .expect("load tasks")
        .iter()
        .map(|t: &Task| (t.number(), t.status()))
        .collect()
}

pub fn status_of(path: &PathBuf, number: TaskNumber) -> Status {
    statuses(path)
        .into_iter()
        .find(|(n, _)| *n == number)
        .map(|(_, s)| s)
        .expect("task present")
}

/// Force a task's stored status, bypassing the state machine.
pub fn force_status(path: &PathBuf, number: TaskNumber, status: Status) {
    let store = TaskStore::open(path).expect("open task table");
    let task = store
        .load_all()
        .expect("load tasks")
        .into_iter()
        .find(|t| t.number() == number)
        .expect("task present");
    let forced = Task::new(task.number(), task.function_id(), status);
    store.update(&forced).expect("update");
}
