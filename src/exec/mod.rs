// src/exec/mod.rs

//! Execution layer.
//!
//! - [`task_runner`] runs a task function on a blocking thread while
//!   listening for termination signals.
//! - [`submit`] provides the `Submitter` trait used by the manager to hand
//!   long-running work to an external batch system, and a concrete
//!   `CommandSubmitter` that shells out to a submission command. Tests can
//!   replace it with a fake implementation.

pub mod submit;
pub mod task_runner;

pub use submit::{CommandSubmitter, JobDescription, Submitter};
pub use task_runner::{ExecutionOutcome, run_task_function, termination_signal};
