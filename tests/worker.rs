// tests/worker.rs

mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::json;
use slotdag::context::{
    ExecutionContext, InMemoryContext, InMemoryState, TaskArgs, TaskFunction, TaskResults,
};
use slotdag::dag::TaskDag;
use slotdag::engine::{AbortMarkers, CycleOutcome, Worker, WorkerSession};
use slotdag::errors::SlotdagError;
use slotdag::lock::lock_path_for;
use slotdag::store::TaskStore;
use slotdag::task::{Task, TaskMetadata};
use slotdag::types::Status;
use slotdag_test_utils::{ConfigFileBuilder, ContextBuilder};
use tokio::sync::Notify;

use crate::common::{init_tracing, job, status_of, statuses, with_timeout};

fn chain_context() -> InMemoryContext {
    ContextBuilder::new()
        .function("first", &[], &["a"], false)
        .function("second", &["a"], &["b"], false)
        .function("third", &["b"], &[], false)
        .build()
}

#[tokio::test]
async fn linear_chain_runs_to_completion_in_order() {
    init_tracing();
    let (_dir, path) = job(&["first", "second", "third"]);
    let ctx = Arc::new(chain_context());
    let cfg = ConfigFileBuilder::new().build();

    let mut worker = Worker::new(&path, &cfg, Arc::clone(&ctx)).without_signal_handlers();
    let completed = with_timeout(worker.run()).await.unwrap();

    assert_eq!(completed, vec![0, 1, 2]);
    assert_eq!(
        statuses(&path),
        vec![
            (0, Status::Completed),
            (1, Status::Completed),
            (2, Status::Completed),
        ]
    );
    assert_eq!(worker.session().state().completed, vec![0, 1, 2]);
    assert_eq!(worker.session().owned().count(), 0);

    let reported = ctx.reported();
    assert_eq!(reported.len(), 3);
    assert_eq!(reported[1].1, json!({"function": "second", "task_number": 1}));

    assert!(!lock_path_for(&path).exists());
}

#[tokio::test]
async fn single_cycle_when_not_consuming_fast_tasks() {
    let (_dir, path) = job(&["first", "second", "third"]);
    let cfg = ConfigFileBuilder::new().consume_fast_tasks(false).build();

    let mut worker =
        Worker::new(&path, &cfg, Arc::new(chain_context())).without_signal_handlers();
    let completed = with_timeout(worker.run()).await.unwrap();

    assert_eq!(completed, vec![0]);
    assert_eq!(status_of(&path, 1), Status::Unassigned);
}

#[tokio::test]
async fn reader_submitted_before_writer_does_not_wait() {
    let (_dir, path) = job(&["second", "first"]);
    // Task 0 reads `a`, but the only writer of `a` comes after it, so task 0
    // has no producer and is ready immediately.
    let cfg = ConfigFileBuilder::new().consume_fast_tasks(false).build();
    let mut worker =
        Worker::new(&path, &cfg, Arc::new(chain_context())).without_signal_handlers();

    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Completed(0));
    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Completed(1));
    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Idle);
}

#[tokio::test]
async fn empty_job_is_idle() {
    let (_dir, path) = job(&[]);
    let cfg = ConfigFileBuilder::new().build();
    let mut worker =
        Worker::new(&path, &cfg, Arc::new(chain_context())).without_signal_handlers();

    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Idle);
    assert!(worker.run().await.unwrap().is_empty());
}

#[test]
fn admission_control_caps_long_tasks_only() {
    let mut session = WorkerSession::new((), 2);
    assert!(session.can_admit(true));

    session.claim(10, true);
    session.claim(11, true);
    session.claim(12, false);

    assert_eq!(session.owned_long(), 2);
    assert!(!session.can_admit(true));
    assert!(session.can_admit(false));

    // Finishing a long task does not refill the budget.
    assert_eq!(session.release(11), Some(true));
    assert_eq!(session.owned_long(), 1);
    assert_eq!(session.long_taken(), 2);
    assert!(!session.can_admit(true));
    assert!(session.can_admit(false));
    assert_eq!(session.release(99), None);
}

#[tokio::test]
async fn draining_worker_takes_at_most_its_long_task_budget() {
    init_tracing();
    let (_dir, path) = job(&["simulate", "simulate", "simulate", "tidy"]);
    let ctx = ContextBuilder::new()
        .function("simulate", &[], &[], true)
        .function("tidy", &[], &[], false)
        .build();
    let cfg = ConfigFileBuilder::new().max_long_tasks(2).build();

    let mut worker = Worker::new(&path, &cfg, Arc::new(ctx)).without_signal_handlers();
    let completed = with_timeout(worker.run()).await.unwrap();

    assert_eq!(completed, vec![0, 1]);
    assert_eq!(worker.session().long_taken(), 2);
    assert_eq!(
        statuses(&path),
        vec![
            (0, Status::Completed),
            (1, Status::Completed),
            (2, Status::Unassigned),
            (3, Status::Unassigned),
        ]
    );

    // A later cycle of the same worker is still refused the long task.
    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Refused(2));

    // A fresh worker has a fresh budget.
    let mut next = Worker::new(&path, &cfg, Arc::new(
        ContextBuilder::new()
            .function("simulate", &[], &[], true)
            .function("tidy", &[], &[], false)
            .build(),
    ))
    .without_signal_handlers();
    assert_eq!(with_timeout(next.run()).await.unwrap(), vec![2, 3]);
}

#[tokio::test]
async fn ready_sets_shrink_along_a_linear_chain() {
    let (_dir, path) = job(&["first", "second", "third"]);
    let ctx = Arc::new(chain_context());
    let cfg = ConfigFileBuilder::new().consume_fast_tasks(false).build();
    let mut worker = Worker::new(&path, &cfg, Arc::clone(&ctx)).without_signal_handlers();

    let ready_now = || {
        let pending: Vec<Task> = TaskStore::open(&path)
            .unwrap()
            .load_all()
            .unwrap()
            .into_iter()
            .filter(|t| t.status().is_not_completed())
            .collect();
        let dag = TaskDag::build(pending, &*ctx).unwrap();
        dag.ready().iter().map(|t| t.number()).collect::<Vec<_>>()
    };

    assert_eq!(ready_now(), vec![0]);
    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Completed(0));
    assert_eq!(ready_now(), vec![1]);
    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Completed(1));
    assert_eq!(ready_now(), vec![2]);
    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Completed(2));
    assert!(ready_now().is_empty());
    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Idle);
}

/// Delegates to an in-memory context and records, for every reported
/// result, whether the task file lock existed at that moment.
struct LockAwareContext {
    inner: InMemoryContext,
    lock_path: PathBuf,
    lock_seen: Mutex<Vec<bool>>,
    reject_reports: bool,
}

impl ExecutionContext for LockAwareContext {
    type State = InMemoryState;

    fn initial_state(&self) -> Self::State {
        self.inner.initial_state()
    }

    fn resolve_metadata(&self, task: &Task) -> slotdag::errors::Result<TaskMetadata> {
        self.inner.resolve_metadata(task)
    }

    fn task_function(&self, task: &Task) -> slotdag::errors::Result<Arc<dyn TaskFunction>> {
        self.inner.task_function(task)
    }

    fn args(&self, task: &Task, state: &Self::State) -> slotdag::errors::Result<TaskArgs> {
        self.inner.args(task, state)
    }

    fn report_results(
        &self,
        task: &Task,
        results: TaskResults,
        state: &mut Self::State,
    ) -> slotdag::errors::Result<()> {
        self.lock_seen.lock().unwrap().push(self.lock_path.exists());
        if self.reject_reports {
            return Err(SlotdagError::Other(anyhow::anyhow!("results store offline")));
        }
        self.inner.report_results(task, results, state)
    }
}

fn lock_aware(path: &std::path::Path, reject_reports: bool) -> LockAwareContext {
    LockAwareContext {
        inner: ContextBuilder::new().function("tidy", &[], &[], false).build(),
        lock_path: lock_path_for(path),
        lock_seen: Mutex::new(Vec::new()),
        reject_reports,
    }
}

#[tokio::test]
async fn results_are_reported_while_holding_the_lock() {
    let (_dir, path) = job(&["tidy", "tidy"]);
    let ctx = Arc::new(lock_aware(&path, false));
    let cfg = ConfigFileBuilder::new().build();

    let mut worker = Worker::new(&path, &cfg, Arc::clone(&ctx)).without_signal_handlers();
    assert_eq!(worker.run().await.unwrap(), vec![0, 1]);

    assert_eq!(*ctx.lock_seen.lock().unwrap(), vec![true, true]);
    assert_eq!(worker.session().state().completed, vec![0, 1]);
}

#[tokio::test]
async fn failed_report_leaves_task_assigned() {
    let (_dir, path) = job(&["tidy"]);
    let ctx = Arc::new(lock_aware(&path, true));
    let cfg = ConfigFileBuilder::new().build();

    let mut worker = Worker::new(&path, &cfg, Arc::clone(&ctx)).without_signal_handlers();
    let err = worker.run_one_task().await.unwrap_err();

    assert!(matches!(err, SlotdagError::Other(_)), "got {err:?}");
    assert_eq!(status_of(&path, 0), Status::Assigned);
    assert!(ctx.inner.reported().is_empty());
    assert!(!lock_path_for(&path).exists());
}

#[tokio::test]
async fn long_task_is_refused_at_capacity_without_status_change() {
    let (_dir, path) = job(&["simulate"]);
    let ctx = ContextBuilder::new()
        .function("simulate", &[], &["out"], true)
        .build();
    let cfg = ConfigFileBuilder::new().max_long_tasks(2).build();

    let mut worker = Worker::new(&path, &cfg, Arc::new(ctx)).without_signal_handlers();
    worker.session_mut().claim(100, true);
    worker.session_mut().claim(101, true);

    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Refused(0));
    assert_eq!(status_of(&path, 0), Status::Unassigned);
    assert!(worker.run().await.unwrap().is_empty());
}

#[tokio::test]
async fn fast_task_is_accepted_at_capacity() {
    let (_dir, path) = job(&["tidy"]);
    let ctx = ContextBuilder::new().function("tidy", &[], &[], false).build();
    let cfg = ConfigFileBuilder::new().max_long_tasks(2).build();

    let mut worker = Worker::new(&path, &cfg, Arc::new(ctx)).without_signal_handlers();
    worker.session_mut().claim(100, true);
    worker.session_mut().claim(101, true);

    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Completed(0));
    assert_eq!(worker.session().owned_long(), 2);
}

#[tokio::test]
async fn configured_fast_override_beats_context_classification() {
    let (_dir, path) = job(&["simulate"]);
    let ctx = ContextBuilder::new()
        .function("simulate", &[], &[], true)
        .build();
    let cfg = ConfigFileBuilder::new()
        .max_long_tasks(1)
        .function_fast("simulate", true)
        .build();

    let mut worker = Worker::new(&path, &cfg, Arc::new(ctx)).without_signal_handlers();
    worker.session_mut().claim(100, true);

    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Completed(0));
}

#[tokio::test]
async fn failing_function_marks_task_failed_and_blocks_dependents() {
    init_tracing();
    let (_dir, path) = job(&["broken", "after"]);
    let ctx = ContextBuilder::new()
        .function_with("broken", &[], &["a"], false, |_| {
            anyhow::bail!("disk full")
        })
        .function("after", &["a"], &[], false)
        .build();
    let cfg = ConfigFileBuilder::new().build();

    let mut worker = Worker::new(&path, &cfg, Arc::new(ctx)).without_signal_handlers();
    match worker.run().await {
        Err(SlotdagError::TaskExecution {
            number,
            function_id,
            source,
        }) => {
            assert_eq!(number, 0);
            assert_eq!(function_id, "broken");
            assert!(source.to_string().contains("disk full"));
        }
        other => panic!("expected TaskExecution, got {other:?}"),
    }

    assert_eq!(
        statuses(&path),
        vec![(0, Status::Failed), (1, Status::Unassigned)]
    );
    assert_eq!(worker.session().owned().count(), 0);
    assert_eq!(worker.run_one_task().await.unwrap(), CycleOutcome::Idle);
}

#[tokio::test]
async fn panicking_function_is_reported_as_failure() {
    let (_dir, path) = job(&["explode"]);
    let ctx = ContextBuilder::new()
        .function_with("explode", &[], &[], false, |_| panic!("kaboom"))
        .build();
    let cfg = ConfigFileBuilder::new().build();

    let mut worker = Worker::new(&path, &cfg, Arc::new(ctx)).without_signal_handlers();
    let err = worker.run_one_task().await.unwrap_err();

    assert!(matches!(err, SlotdagError::TaskExecution { number: 0, .. }), "got {err:?}");
    assert_eq!(status_of(&path, 0), Status::Failed);
}

#[tokio::test]
async fn unregistered_binding_fails_before_assignment() {
    let (_dir, path) = job(&["ghost"]);
    let ctx = ContextBuilder::new().spec_only("ghost", &[], &[], false).build();
    let cfg = ConfigFileBuilder::new().build();

    let mut worker = Worker::new(&path, &cfg, Arc::new(ctx)).without_signal_handlers();
    let err = worker.run_one_task().await.unwrap_err();

    assert!(matches!(err, SlotdagError::UnknownFunction(ref f) if f == "ghost"));
    assert_eq!(status_of(&path, 0), Status::Unassigned);
    assert!(!lock_path_for(&path).exists());
}

#[tokio::test]
async fn held_lock_makes_the_cycle_time_out() {
    let (_dir, path) = job(&["first"]);
    let cfg = ConfigFileBuilder::new().runner_lock(0.1, 0.02).build();

    let mut blocker = cfg.runner.lockfile.make_lock(&path);
    blocker.acquire().await.unwrap();

    let mut worker =
        Worker::new(&path, &cfg, Arc::new(chain_context())).without_signal_handlers();
    let err = worker.run_one_task().await.unwrap_err();
    assert!(matches!(err, SlotdagError::LockTimeout { .. }), "got {err:?}");
    assert_eq!(status_of(&path, 0), Status::Unassigned);

    blocker.release().unwrap();
}

/// A function that sleeps on its first call and returns immediately after.
fn slow_once_context() -> InMemoryContext {
    let first_call = Arc::new(AtomicBool::new(true));
    ContextBuilder::new()
        .function_with("simulate", &[], &["out"], true, move |_| {
            if first_call.swap(false, Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(500));
            }
            Ok(json!("done"))
        })
        .build()
}

#[tokio::test]
async fn interrupted_task_stays_assigned_and_is_reclaimed() {
    init_tracing();
    let (_dir, path) = job(&["simulate"]);
    let ctx = Arc::new(slow_once_context());
    let cfg = ConfigFileBuilder::new().build();
    let markers = AbortMarkers::new(&path);

    let notify = Arc::new(Notify::new());
    let mut worker = Worker::new(&path, &cfg, Arc::clone(&ctx))
        .without_signal_handlers()
        .with_abort_policy(markers.clone())
        .with_interrupt(Arc::clone(&notify));

    notify.notify_one();
    let err = with_timeout(worker.run()).await.unwrap_err();

    assert!(matches!(err, SlotdagError::Interrupted(0)), "got {err:?}");
    assert_eq!(status_of(&path, 0), Status::Assigned);
    assert!(markers.marker_path(0).exists());
    assert_eq!(worker.session().owned_long(), 0);

    // A plain worker does not touch assigned tasks.
    let mut plain = Worker::new(&path, &cfg, Arc::clone(&ctx)).without_signal_handlers();
    assert_eq!(plain.run_one_task().await.unwrap(), CycleOutcome::Idle);

    // A worker that tracks aborts reclaims it ahead of anything else.
    let mut rescuer = Worker::new(&path, &cfg, Arc::clone(&ctx))
        .without_signal_handlers()
        .with_abort_policy(markers.clone());
    assert_eq!(
        with_timeout(rescuer.run_one_task()).await.unwrap(),
        CycleOutcome::Completed(0)
    );
    assert_eq!(status_of(&path, 0), Status::Completed);
    assert!(!markers.marker_path(0).exists());
}

#[tokio::test]
async fn reclaimed_task_takes_priority_over_ready_work() {
    let (_dir, path) = job(&["tidy", "simulate"]);
    let ctx = ContextBuilder::new()
        .function("tidy", &[], &[], false)
        .function("simulate", &[], &[], true)
        .build();
    let cfg = ConfigFileBuilder::new().consume_fast_tasks(false).build();
    let markers = AbortMarkers::new(&path);

    common::force_status(&path, 1, Status::Assigned);
    std::fs::write(markers.marker_path(1), "pid=1\n").unwrap();

    let mut worker = Worker::new(&path, &cfg, Arc::new(ctx))
        .without_signal_handlers()
        .with_abort_policy(markers);
    assert_eq!(worker.run().await.unwrap(), vec![1]);
    assert_eq!(status_of(&path, 0), Status::Unassigned);
}

#[tokio::test]
async fn stale_marker_for_unassigned_task_is_ignored() {
    let (_dir, path) = job(&["tidy"]);
    let ctx = ContextBuilder::new().function("tidy", &[], &[], false).build();
    let cfg = ConfigFileBuilder::new().build();
    let markers = AbortMarkers::new(&path);
    std::fs::write(markers.marker_path(0), "pid=1\n").unwrap();

    let mut worker = Worker::new(&path, &cfg, Arc::new(ctx))
        .without_signal_handlers()
        .with_abort_policy(markers.clone());
    assert_eq!(worker.run().await.unwrap(), vec![0]);
    // Assignment clears the leftover marker.
    assert!(!markers.marker_path(0).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workers_never_run_a_task_twice() {
    init_tracing();
    let ids: Vec<&str> = std::iter::repeat("work").take(12).collect();
    let (_dir, path) = job(&ids);
    let ctx = Arc::new(
        ContextBuilder::new()
            .function_with("work", &[], &[], false, |_| {
                std::thread::sleep(Duration::from_millis(5));
                Ok(json!(null))
            })
            .build(),
    );
    let cfg = ConfigFileBuilder::new().build();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let mut worker = Worker::new(&path, &cfg, Arc::clone(&ctx)).without_signal_handlers();
        handles.push(tokio::spawn(async move { worker.run().await }));
    }

    let mut all = Vec::new();
    for h in handles {
        all.extend(with_timeout(h).await.unwrap().unwrap());
    }
    all.sort_unstable();
    assert_eq!(all, (0..12).collect::<Vec<u64>>());
    assert!(statuses(&path).iter().all(|(_, s)| *s == Status::Completed));
    assert_eq!(ctx.reported().len(), 12);
}
