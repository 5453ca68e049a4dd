use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use slotdag::errors::{Result, SlotdagError};
use slotdag::exec::{JobDescription, Submitter};
use slotdag::types::TaskNumber;

/// A fake submitter that:
/// - records every job it is handed
/// - optionally rejects submissions once `accept_limit` jobs were accepted.
#[derive(Clone, Default)]
pub struct FakeSubmitter {
    jobs: Arc<Mutex<Vec<JobDescription>>>,
    accept_limit: Option<usize>,
}

impl FakeSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the first `n` jobs, then fail every later submission.
    pub fn failing_after(n: usize) -> Self {
        Self {
            jobs: Arc::default(),
            accept_limit: Some(n),
        }
    }

    /// Shared handle to the recorded jobs.
    pub fn jobs(&self) -> Arc<Mutex<Vec<JobDescription>>> {
        Arc::clone(&self.jobs)
    }

    pub fn submitted(&self) -> Vec<TaskNumber> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|j| j.task_number)
            .collect()
    }
}

impl Submitter for FakeSubmitter {
    fn submit(
        &mut self,
        job: JobDescription,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let jobs = Arc::clone(&self.jobs);
        let limit = self.accept_limit;

        Box::pin(async move {
            let mut guard = jobs.lock().unwrap();
            if limit.is_some_and(|n| guard.len() >= n) {
                return Err(SlotdagError::Submission {
                    number: job.task_number,
                    reason: "fake batch system rejected the job".to_string(),
                });
            }
            guard.push(job);
            Ok(())
        })
    }
}
