// src/store.rs

//! Persisted task table.
//!
//! The storage layout is a single SQLite table:
//!
//! | number (primary key) | function_id | status |
//!
//! The store is a dumb persistence layer. It does no locking and no retries;
//! every call that feeds or records a scheduling decision must be made while
//! the caller holds the [`LockFile`](crate::lock::LockFile) for the task file.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use tracing::debug;

use crate::errors::{Result, SlotdagError};
use crate::task::{Task, TaskRow};
use crate::types::Status;

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        number      INTEGER PRIMARY KEY,
        function_id TEXT    NOT NULL,
        status      INTEGER NOT NULL
    )";

pub struct TaskStore {
    path: PathBuf,
    conn: Connection,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    /// Open the task file, creating the table if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self { path, conn })
    }

    /// Initialise a task file for a newly submitted job: one `Unassigned`
    /// task per function id, numbered in submission order.
    pub fn create<I, S>(path: impl AsRef<Path>, function_ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self::open(path)?;
        let tasks: Vec<Task> = function_ids
            .into_iter()
            .enumerate()
            .map(|(number, function_id)| Task::new(number as u64, function_id, Status::Unassigned))
            .collect();
        store.insert(&tasks)?;
        debug!(path = ?store.path, count = tasks.len(), "created task table");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append rows for `tasks` in a single transaction.
    pub fn insert(&mut self, tasks: &[Task]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO tasks (number, function_id, status) VALUES (?1, ?2, ?3)")?;
            for task in tasks {
                let row = task.serialize();
                stmt.execute(params![row.number as i64, row.function_id, row.status])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Persist the status of a single task.
    pub fn update(&self, task: &Task) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET status = ?1 WHERE number = ?2",
            params![task.status().as_i64(), task.number() as i64],
        )?;
        if changed == 0 {
            return Err(SlotdagError::MissingTask(task.number()));
        }
        debug!(task = task.number(), status = %task.status(), "persisted task status");
        Ok(())
    }

    /// Raw rows ordered by task number.
    pub fn load_rows(&self) -> Result<Vec<TaskRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT number, function_id, status FROM tasks ORDER BY number")?;
        let rows = stmt.query_map([], |r| {
            Ok(TaskRow {
                number: r.get::<_, i64>(0)? as u64,
                function_id: r.get(1)?,
                status: r.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Every task in the table, in submission order.
    pub fn load_all(&self) -> Result<Vec<Task>> {
        self.load_rows()?
            .into_iter()
            .map(Task::deserialize)
            .collect()
    }
}
