// src/exec/submit.rs

//! Hand-off of long-running work to an external batch system.
//!
//! Submission is fire-and-forget: a `Submitter` only reports whether the
//! batch system accepted the job, never whether the job ran.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{Result, SlotdagError};
use crate::types::{FunctionId, TaskNumber};

/// One job to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription {
    pub task_file: PathBuf,
    pub task_number: TaskNumber,
    pub function_id: FunctionId,
    pub command: String,
    pub script: String,
}

impl JobDescription {
    /// The script with `{task_file}`, `{task_number}` and `{function_id}`
    /// substituted.
    pub fn rendered_script(&self) -> String {
        self.script
            .replace("{task_file}", &self.task_file.to_string_lossy())
            .replace("{task_number}", &self.task_number.to_string())
            .replace("{function_id}", &self.function_id)
    }
}

/// Trait abstracting how jobs reach the batch system.
///
/// Production code uses [`CommandSubmitter`]; tests provide their own
/// implementation that records jobs instead of running anything.
pub trait Submitter: Send {
    fn submit(
        &mut self,
        job: JobDescription,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Runs the configured `command` through `sh -c`, feeding the rendered
/// script on stdin (the way `sbatch` and `qsub` accept scripts).
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandSubmitter;

impl Submitter for CommandSubmitter {
    fn submit(
        &mut self,
        job: JobDescription,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { submit_with_command(job).await })
    }
}

async fn submit_with_command(job: JobDescription) -> Result<()> {
    if job.command.trim().is_empty() {
        return Err(SlotdagError::Submission {
            number: job.task_number,
            reason: "no submit command configured".to_string(),
        });
    }

    info!(
        task = job.task_number,
        function_id = %job.function_id,
        command = %job.command,
        "submitting job"
    );

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&job.command)
        .env("SLOTDAG_TASK_FILE", &job.task_file)
        .env("SLOTDAG_TASK_NUMBER", job.task_number.to_string())
        .env("SLOTDAG_FUNCTION_ID", &job.function_id)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(job.rendered_script().as_bytes()).await {
            Ok(()) => {}
            // The command is free to exit without reading its input.
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                debug!(task = job.task_number, "submit command did not read the script");
            }
            Err(err) => return Err(err.into()),
        }
        // Dropping stdin closes the pipe so the command sees EOF.
    }

    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(task = job.task_number, stdout = %stdout.trim(), stderr = %stderr.trim(), "submit command output");

    if output.status.success() {
        Ok(())
    } else {
        Err(SlotdagError::Submission {
            number: job.task_number,
            reason: format!(
                "`{}` exited with {}: {}",
                job.command,
                output.status,
                stderr.trim()
            ),
        })
    }
}
