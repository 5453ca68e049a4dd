// src/dag/select.rs

use crate::task::Task;

/// Policy for choosing which ready task a worker takes next.
///
/// The surrounding protocol does not depend on the choice, so this can be
/// swapped for priority or cost-aware strategies.
pub trait TaskSelector: Send + Sync {
    fn select<'a>(&self, ready: &[&'a Task]) -> Option<&'a Task>;
}

/// Take the first ready task in DAG node order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstReady;

impl TaskSelector for FirstReady {
    fn select<'a>(&self, ready: &[&'a Task]) -> Option<&'a Task> {
        ready.first().copied()
    }
}
