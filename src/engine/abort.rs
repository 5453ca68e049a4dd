// src/engine/abort.rs

//! Detection of tasks orphaned by a dead worker.
//!
//! A task left `Assigned` by a worker that died mid-execution would never be
//! completed. An `AbortPolicy` correlates `Assigned` rows with a liveness
//! signal so a later cycle can reclaim them ahead of fresh work.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::Result;
use crate::task::Task;
use crate::types::{Status, TaskNumber};

pub trait AbortPolicy: Send + Sync {
    /// Numbers of tasks in `tasks` known to have been abandoned, in the order
    /// they should be reclaimed.
    fn find_aborted(&self, tasks: &[Task]) -> Result<Vec<TaskNumber>>;

    /// Record that `task` was interrupted while this process executed it.
    fn record_interrupted(&self, task: &Task) -> Result<()>;

    /// Forget any abort record for `task` (called when it is assigned).
    fn clear(&self, task: &Task) -> Result<()>;
}

/// Never finds aborted tasks and records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAbortTracking;

impl AbortPolicy for NoAbortTracking {
    fn find_aborted(&self, _tasks: &[Task]) -> Result<Vec<TaskNumber>> {
        Ok(Vec::new())
    }

    fn record_interrupted(&self, task: &Task) -> Result<()> {
        debug!(task = task.number(), "abort tracking disabled; not recording interruption");
        Ok(())
    }

    fn clear(&self, _task: &Task) -> Result<()> {
        Ok(())
    }
}

/// Crash markers: an interrupted task leaves `.<task file>.aborted.<number>`
/// next to the task file.
#[derive(Debug, Clone)]
pub struct AbortMarkers {
    task_file: PathBuf,
}

impl AbortMarkers {
    pub fn new(task_file: impl Into<PathBuf>) -> Self {
        Self {
            task_file: task_file.into(),
        }
    }

    pub fn marker_path(&self, number: TaskNumber) -> PathBuf {
        let basename = self
            .task_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = self.task_file.parent().unwrap_or_else(|| Path::new(""));
        dir.join(format!(".{basename}.aborted.{number}"))
    }
}

impl AbortPolicy for AbortMarkers {
    fn find_aborted(&self, tasks: &[Task]) -> Result<Vec<TaskNumber>> {
        let aborted: Vec<TaskNumber> = tasks
            .iter()
            .filter(|t| t.status() == Status::Assigned)
            .filter(|t| self.marker_path(t.number()).is_file())
            .map(|t| t.number())
            .collect();
        if !aborted.is_empty() {
            info!(?aborted, "found aborted tasks");
        }
        Ok(aborted)
    }

    fn record_interrupted(&self, task: &Task) -> Result<()> {
        let path = self.marker_path(task.number());
        fs::write(&path, format!("pid={}\n", std::process::id()))?;
        info!(task = task.number(), marker = ?path, "recorded interrupted task");
        Ok(())
    }

    fn clear(&self, task: &Task) -> Result<()> {
        match fs::remove_file(self.marker_path(task.number())) {
            Ok(()) => {
                debug!(task = task.number(), "cleared abort marker");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
