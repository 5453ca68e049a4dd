// src/dag/mod.rs

//! Task DAG derived from slot producer/consumer relationships.
//!
//! - [`graph`] builds the DAG from an ordered task list and answers
//!   readiness queries.
//! - [`select`] holds the policy for picking one task out of the ready set.
//!
//! The DAG is never persisted: it is rebuilt from the task table on every
//! scheduling cycle.

pub mod graph;
pub mod select;

pub use graph::TaskDag;
pub use select::{FirstReady, TaskSelector};
