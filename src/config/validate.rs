// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, LockSettings, RawConfigFile};
use crate::errors::{Result, SlotdagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SlotdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.runner, raw.manager, raw.functions))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_lock_settings("runner.lockfile", &cfg.runner.lockfile)?;
    validate_lock_settings("manager.lockfile", &cfg.manager.lockfile)?;
    validate_runner(cfg)?;
    validate_functions(cfg)?;
    Ok(())
}

fn validate_lock_settings(section: &str, lock: &LockSettings) -> Result<()> {
    if !lock.timeout.is_finite() || lock.timeout < 0.0 {
        return Err(SlotdagError::ConfigError(format!(
            "[{section}].timeout must be a finite number >= 0 (got {})",
            lock.timeout
        )));
    }
    if !lock.delay.is_finite() || lock.delay <= 0.0 {
        return Err(SlotdagError::ConfigError(format!(
            "[{section}].delay must be a finite number > 0 (got {})",
            lock.delay
        )));
    }
    Ok(())
}

fn validate_runner(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runner.max_long_tasks == 0 {
        return Err(SlotdagError::ConfigError(
            "[runner].max_long_tasks must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_functions(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for f in cfg.functions.iter() {
        if f.name.trim().is_empty() {
            return Err(SlotdagError::ConfigError(
                "[[functions]] entry with an empty name".to_string(),
            ));
        }
        if !seen.insert(f.name.as_str()) {
            return Err(SlotdagError::ConfigError(format!(
                "function '{}' is configured more than once",
                f.name
            )));
        }
    }
    Ok(())
}
