use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SlotdagError;

/// Stable task identifier, assigned at submission and never reused.
pub type TaskNumber = u64;

/// Opaque function identifier resolved by the execution context.
pub type FunctionId = String;

/// Name of a data slot a task reads or writes.
pub type SlotName = String;

/// Lifecycle of a task.
///
/// `Unassigned -> Queued -> Assigned -> Completed`, with `Failed` as the
/// terminal state for tasks whose function returned an error. The integer
/// codes are what the task table stores.
///
/// - `Unassigned` and `Queued` are *available*: a worker may pick them up.
/// - `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Unassigned = 0,
    Queued = 1,
    Assigned = 2,
    Completed = 3,
    Failed = 4,
}

impl Status {
    pub fn is_available(self) -> bool {
        matches!(self, Status::Unassigned | Status::Queued)
    }

    pub fn is_not_completed(self) -> bool {
        self != Status::Completed
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// `Assigned -> Assigned` is how a worker reclaims an orphaned task.
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Unassigned, Queued)
                | (Unassigned, Assigned)
                | (Queued, Assigned)
                | (Assigned, Assigned)
                | (Assigned, Completed)
                | (Assigned, Failed)
        )
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unassigned => "unassigned",
            Status::Queued => "queued",
            Status::Assigned => "assigned",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Unassigned
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for Status {
    type Error = SlotdagError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Status::Unassigned),
            1 => Ok(Status::Queued),
            2 => Ok(Status::Assigned),
            3 => Ok(Status::Completed),
            4 => Ok(Status::Failed),
            other => Err(SlotdagError::InvalidStatus(other)),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unassigned" => Ok(Status::Unassigned),
            "queued" => Ok(Status::Queued),
            "assigned" => Ok(Status::Assigned),
            "completed" => Ok(Status::Completed),
            "failed" => Ok(Status::Failed),
            other => Err(format!(
                "invalid task status: {other} (expected unassigned, queued, assigned, completed or failed)"
            )),
        }
    }
}
