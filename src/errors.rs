// src/errors.rs

//! Crate-wide error type.
//!
//! Every failure in a scheduling cycle is reported to the caller of that
//! cycle (the worker or manager driver); nothing is retried or swallowed
//! internally.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{Status, TaskNumber};

#[derive(Error, Debug)]
pub enum SlotdagError {
    #[error("could not acquire lock {path:?} within {timeout:?}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("lock {path:?} was tampered with: expected marker {expected:?}, found {found:?}")]
    LockCorruption {
        path: PathBuf,
        expected: String,
        found: Option<String>,
    },

    #[error("lock {0:?} is not held by this process")]
    LockNotHeld(PathBuf),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invalid status code {0} in task table")]
    InvalidStatus(i64),

    #[error("task {0} does not exist in the task table")]
    MissingTask(TaskNumber),

    #[error("task {number}: illegal status transition {from} -> {to}")]
    InvalidTransition {
        number: TaskNumber,
        from: Status,
        to: Status,
    },

    #[error("task {0}: conflicting metadata for an already populated cache")]
    MetadataConflict(TaskNumber),

    #[error("no function registered under '{0}'")]
    UnknownFunction(String),

    #[error("function '{0}' is already registered")]
    DuplicateFunction(String),

    #[error("task {number} ({function_id}) failed: {source}")]
    TaskExecution {
        number: TaskNumber,
        function_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("task {0} was interrupted by a termination signal")]
    Interrupted(TaskNumber),

    #[error("job submission for task {number} failed: {reason}")]
    Submission { number: TaskNumber, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SlotdagError {
    /// Whether this error belongs to the persistence family (`StorageError`).
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            SlotdagError::Storage(_) | SlotdagError::InvalidStatus(_) | SlotdagError::MissingTask(_)
        )
    }

    /// Whether this error is one of the lock conditions.
    pub fn is_lock(&self) -> bool {
        matches!(
            self,
            SlotdagError::LockTimeout { .. }
                | SlotdagError::LockCorruption { .. }
                | SlotdagError::LockNotHeld(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SlotdagError>;
