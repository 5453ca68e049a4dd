// src/engine/session.rs

//! Per-worker session state.
//!
//! Admission control is a pure function of this state: no Tokio types, no
//! IO, no process-wide counters.
//!
//! The long-task budget is spent for the lifetime of the session. A worker
//! submitted by the manager to run long work takes at most `max_long_tasks`
//! of it and afterwards only drains fast tasks.

use std::collections::BTreeMap;

use crate::types::TaskNumber;

#[derive(Debug)]
pub struct WorkerSession<S> {
    state: S,
    /// Tasks currently owned by this worker, with their long-running flag.
    owned: BTreeMap<TaskNumber, bool>,
    /// Long-running tasks ever claimed by this session.
    long_taken: usize,
    max_long_tasks: usize,
}

impl<S> WorkerSession<S> {
    pub fn new(state: S, max_long_tasks: usize) -> Self {
        Self {
            state,
            owned: BTreeMap::new(),
            long_taken: 0,
            max_long_tasks,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn max_long_tasks(&self) -> usize {
        self.max_long_tasks
    }

    /// Number of owned tasks classified as long-running.
    pub fn owned_long(&self) -> usize {
        self.owned.values().filter(|&&long| long).count()
    }

    /// Long-running tasks claimed over the whole session, released or not.
    pub fn long_taken(&self) -> usize {
        self.long_taken
    }

    pub fn owned(&self) -> impl Iterator<Item = TaskNumber> + '_ {
        self.owned.keys().copied()
    }

    /// Fast tasks are always admitted; a long task only while the session
    /// has claimed fewer than `max_long_tasks` long tasks so far.
    pub fn can_admit(&self, is_long: bool) -> bool {
        !is_long || self.long_taken < self.max_long_tasks
    }

    pub fn claim(&mut self, number: TaskNumber, is_long: bool) {
        if is_long {
            self.long_taken += 1;
        }
        self.owned.insert(number, is_long);
    }

    /// Drop ownership of `number`, returning its long-running flag.
    ///
    /// The long-task budget it used stays spent.
    pub fn release(&mut self, number: TaskNumber) -> Option<bool> {
        self.owned.remove(&number)
    }
}
