// src/engine/mod.rs

//! Scheduling engine for slotdag.
//!
//! This module ties together:
//! - the per-worker session and its admission control ([`session`])
//! - detection of tasks orphaned by dead workers ([`abort`])
//! - the worker cycle: select, assign, execute, complete ([`worker`])
//! - the manager pass that submits long-running work ([`manager`])
//!
//! Workers and managers never talk to each other. All coordination goes
//! through the task table, and every read-decide-write step on it happens
//! under the task file lock.

pub mod abort;
pub mod manager;
pub mod session;
pub mod worker;

pub use abort::{AbortMarkers, AbortPolicy, NoAbortTracking};
pub use manager::{Manager, ManagerReport};
pub use session::WorkerSession;
pub use worker::{CycleOutcome, Worker};
