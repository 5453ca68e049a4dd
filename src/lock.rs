// src/lock.rs

//! Cooperative cross-process lock backed by a marker file.
//!
//! The lock for `dir/tasks.db` lives at `dir/.tasks.db.lock`. Mutual exclusion
//! comes entirely from the filesystem: the lock file is created with
//! `create_new`, so exactly one participant can create it at a time. The
//! guarded resource itself is never opened by this module.
//!
//! The lock is advisory. It only protects against participants that follow
//! the same acquire/release protocol.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::errors::{Result, SlotdagError};

/// Handle kept open while the lock is held.
#[derive(Debug)]
struct HeldLock {
    _file: File,
    marker: String,
}

/// A named mutual-exclusion token tied to a target resource path.
#[derive(Debug)]
pub struct LockFile {
    target: PathBuf,
    path: PathBuf,
    timeout: Duration,
    delay: Duration,
    held: Option<HeldLock>,
}

/// Path of the lock file guarding `target`: a hidden sibling with a `.lock`
/// suffix.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let basename = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = target.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!(".{basename}.lock"))
}

fn owner_marker() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!("{host}:{}:{}", std::process::id(), Uuid::new_v4())
}

impl LockFile {
    pub fn new(target: impl Into<PathBuf>, timeout: Duration, delay: Duration) -> Self {
        let target = target.into();
        let path = lock_path_for(&target);
        Self {
            target,
            path,
            timeout,
            delay,
            held: None,
        }
    }

    /// The guarded resource.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The lock file itself.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Block (asynchronously) until the lock file can be created.
    ///
    /// Polls every `delay` and gives up with [`SlotdagError::LockTimeout`]
    /// once more than `timeout` has elapsed since the first attempt.
    pub async fn acquire(&mut self) -> Result<()> {
        let start = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            match OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(file) => {
                    let marker = owner_marker();
                    self.install(file, marker)?;
                    debug!(path = ?self.path, attempts, "lock acquired");
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if start.elapsed() > self.timeout {
                        warn!(
                            path = ?self.path,
                            attempts,
                            timeout = ?self.timeout,
                            "giving up on lock"
                        );
                        return Err(SlotdagError::LockTimeout {
                            path: self.path.clone(),
                            timeout: self.timeout,
                        });
                    }
                    trace!(path = ?self.path, attempts, "lock busy; retrying");
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn install(&mut self, mut file: File, marker: String) -> Result<()> {
        let written = file
            .write_all(marker.as_bytes())
            .and_then(|_| file.sync_all());

        if let Err(err) = written {
            // We created the file, so it is ours to remove.
            drop(file);
            let _ = fs::remove_file(&self.path);
            return Err(err.into());
        }

        self.held = Some(HeldLock {
            _file: file,
            marker,
        });
        Ok(())
    }

    /// Close and delete the lock file.
    pub fn release(&mut self) -> Result<()> {
        let held = self
            .held
            .take()
            .ok_or_else(|| SlotdagError::LockNotHeld(self.path.clone()))?;
        drop(held);
        fs::remove_file(&self.path)?;
        debug!(path = ?self.path, "lock released");
        Ok(())
    }

    /// Check that the lock file still carries the marker written at
    /// acquisition.
    ///
    /// A missing file or different content means another party bypassed
    /// the protocol; the lock can no longer be trusted.
    pub fn validate_lock(&self) -> Result<()> {
        let held = self
            .held
            .as_ref()
            .ok_or_else(|| SlotdagError::LockNotHeld(self.path.clone()))?;

        let found = match fs::read_to_string(&self.path) {
            Ok(content) => Some(content),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        if found.as_deref() == Some(held.marker.as_str()) {
            return Ok(());
        }

        warn!(path = ?self.path, ?found, "lock marker mismatch");
        Err(SlotdagError::LockCorruption {
            path: self.path.clone(),
            expected: held.marker.clone(),
            found,
        })
    }

    /// Run `critical` with the lock held.
    ///
    /// The lock is validated after acquisition and released afterwards
    /// whether or not `critical` succeeds. A corrupted lock is dropped
    /// without deleting the file, since the file no longer belongs to us.
    pub async fn with_lock<T, F>(&mut self, critical: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.acquire().await?;
        self.validate_or_abandon()?;

        let outcome = critical();
        let released = self.release();
        let value = outcome?;
        released?;
        Ok(value)
    }

    /// Validate a freshly acquired lock; on failure forget it without
    /// touching the file.
    pub fn validate_or_abandon(&mut self) -> Result<()> {
        if let Err(err) = self.validate_lock() {
            self.abandon();
            return Err(err);
        }
        Ok(())
    }

    /// Close the handle without deleting the lock file.
    ///
    /// Used when the file is known not to be ours any more.
    pub fn abandon(&mut self) {
        if self.held.take().is_some() {
            warn!(path = ?self.path, "abandoning lock without removing it");
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if self.held.take().is_some() {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!(path = ?self.path, "lock released on drop"),
                Err(err) => warn!(path = ?self.path, error = %err, "failed to remove lock on drop"),
            }
        }
    }
}
