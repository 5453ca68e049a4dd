// src/config/mod.rs

//! Configuration loading and validation for slotdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants such as sane lock timings (`validate.rs`).
//! - Per-function classification and submission overrides (`policy.rs`).

pub mod loader;
pub mod model;
pub mod policy;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, FunctionConfig, LockSettings, ManagerConfig, RawConfigFile, RunnerConfig,
    SubmitConfig,
};
pub use policy::FunctionPolicy;
