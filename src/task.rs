// src/task.rs

//! The task entity and its persisted row projection.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SlotdagError};
use crate::types::{FunctionId, SlotName, Status, TaskNumber};

/// Facts about a task derived from the execution context.
///
/// Cached on the task the first time a context is asked about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMetadata {
    pub input_slots: Vec<SlotName>,
    pub output_slots: Vec<SlotName>,
    /// Registry key of the function that executes this task.
    pub binding: String,
    pub long_running: bool,
}

/// One unit of work.
///
/// A task is treated as an immutable record: only `status` (through
/// [`Task::transition`]) and the write-once metadata cache ever change.
#[derive(Clone)]
pub struct Task {
    number: TaskNumber,
    function_id: FunctionId,
    status: Status,
    metadata: OnceLock<TaskMetadata>,
}

/// Persisted projection of a [`Task`]: `(number, function_id, status)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    pub number: TaskNumber,
    pub function_id: FunctionId,
    pub status: i64,
}

impl Task {
    pub fn new(number: TaskNumber, function_id: impl Into<FunctionId>, status: Status) -> Self {
        Self {
            number,
            function_id: function_id.into(),
            status,
            metadata: OnceLock::new(),
        }
    }

    pub fn number(&self) -> TaskNumber {
        self.number
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn metadata(&self) -> Option<&TaskMetadata> {
        self.metadata.get()
    }

    /// Populate the metadata cache.
    ///
    /// Setting a value equal to the cached one is a no-op; a different value
    /// is rejected and the cache keeps its original contents.
    pub fn set_metadata(&self, metadata: TaskMetadata) -> Result<&TaskMetadata> {
        let cached = self.metadata.get_or_init(|| metadata.clone());
        if *cached == metadata {
            Ok(cached)
        } else {
            Err(SlotdagError::MetadataConflict(self.number))
        }
    }

    /// Move to `to`, enforcing the status state machine.
    pub fn transition(&mut self, to: Status) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(SlotdagError::InvalidTransition {
                number: self.number,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn serialize(&self) -> TaskRow {
        TaskRow {
            number: self.number,
            function_id: self.function_id.clone(),
            status: self.status.as_i64(),
        }
    }

    pub fn deserialize(row: TaskRow) -> Result<Self> {
        let status = Status::try_from(row.status)?;
        Ok(Self::new(row.number, row.function_id, status))
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
            && self.function_id == other.function_id
            && self.status == other.status
    }
}

impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("number", &self.number)
            .field("function_id", &self.function_id)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
