// tests/task_status.rs

use slotdag::errors::SlotdagError;
use slotdag::task::{Task, TaskMetadata, TaskRow};
use slotdag::types::Status;

const ALL: [Status; 5] = [
    Status::Unassigned,
    Status::Queued,
    Status::Assigned,
    Status::Completed,
    Status::Failed,
];

#[test]
fn availability_and_completion_predicates() {
    for status in ALL {
        let available = matches!(status, Status::Unassigned | Status::Queued);
        assert_eq!(status.is_available(), available, "{status}");
        assert_eq!(status.is_not_completed(), status != Status::Completed, "{status}");
    }
    assert!(Status::Failed.is_terminal());
    assert!(Status::Completed.is_terminal());
    assert!(!Status::Assigned.is_terminal());
}

#[test]
fn integer_codes_are_stable() {
    let codes: Vec<i64> = ALL.iter().map(|s| s.as_i64()).collect();
    assert_eq!(codes, vec![0, 1, 2, 3, 4]);
    for status in ALL {
        assert_eq!(Status::try_from(status.as_i64()).unwrap(), status);
    }
    assert!(matches!(Status::try_from(7), Err(SlotdagError::InvalidStatus(7))));
}

#[test]
fn status_parses_from_display_form() {
    for status in ALL {
        assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
    }
    assert_eq!(" Queued ".parse::<Status>().unwrap(), Status::Queued);
    assert!("running".parse::<Status>().is_err());
}

#[test]
fn task_row_round_trip() {
    let task = Task::new(3, "simulate", Status::Queued);
    let row = task.serialize();
    assert_eq!(
        row,
        TaskRow {
            number: 3,
            function_id: "simulate".into(),
            status: 1,
        }
    );
    assert_eq!(Task::deserialize(row).unwrap(), task);
}

#[test]
fn deserializing_unknown_status_fails() {
    let row = TaskRow {
        number: 0,
        function_id: "f".into(),
        status: -1,
    };
    let err = Task::deserialize(row).unwrap_err();
    assert!(err.is_storage(), "got {err:?}");
}

#[test]
fn legal_transitions_follow_the_lifecycle() {
    let mut task = Task::new(0, "f", Status::Unassigned);
    task.transition(Status::Queued).unwrap();
    task.transition(Status::Assigned).unwrap();
    // Reclaiming an orphan keeps it assigned.
    task.transition(Status::Assigned).unwrap();
    task.transition(Status::Completed).unwrap();
    assert_eq!(task.status(), Status::Completed);

    let mut failing = Task::new(1, "f", Status::Unassigned);
    failing.transition(Status::Assigned).unwrap();
    failing.transition(Status::Failed).unwrap();
}

#[test]
fn illegal_transitions_are_rejected_without_change() {
    let cases = [
        (Status::Unassigned, Status::Completed),
        (Status::Queued, Status::Unassigned),
        (Status::Completed, Status::Assigned),
        (Status::Failed, Status::Assigned),
        (Status::Assigned, Status::Unassigned),
    ];
    for (from, to) in cases {
        let mut task = Task::new(9, "f", from);
        match task.transition(to) {
            Err(SlotdagError::InvalidTransition { number: 9, from: f, to: t }) => {
                assert_eq!((f, t), (from, to));
            }
            other => panic!("{from} -> {to}: expected InvalidTransition, got {other:?}"),
        }
        assert_eq!(task.status(), from);
    }
}

fn meta(inputs: &[&str], outputs: &[&str]) -> TaskMetadata {
    TaskMetadata {
        input_slots: inputs.iter().map(|s| s.to_string()).collect(),
        output_slots: outputs.iter().map(|s| s.to_string()).collect(),
        binding: "f".into(),
        long_running: false,
    }
}

#[test]
fn metadata_cache_is_write_once() {
    let task = Task::new(0, "f", Status::Unassigned);
    assert!(task.metadata().is_none());

    task.set_metadata(meta(&["a"], &["b"])).unwrap();
    // Same value again is fine.
    task.set_metadata(meta(&["a"], &["b"])).unwrap();

    let err = task.set_metadata(meta(&["x"], &["b"])).unwrap_err();
    assert!(matches!(err, SlotdagError::MetadataConflict(0)));
    assert_eq!(task.metadata(), Some(&meta(&["a"], &["b"])));
}

#[test]
fn equality_ignores_metadata_cache() {
    let a = Task::new(0, "f", Status::Unassigned);
    let b = Task::new(0, "f", Status::Unassigned);
    a.set_metadata(meta(&[], &["out"])).unwrap();
    assert_eq!(a, b);
}
