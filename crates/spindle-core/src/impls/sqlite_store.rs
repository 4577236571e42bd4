//! SQLite implementation of `TaskStore`.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that ordering by the text column is chronological. `seq` breaks ties
//! between rows scheduled in the same microsecond.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use crate::config::StoreConfig;
use crate::domain::{QueueError, Result, Task, TaskId, TaskName, TaskState};
use crate::observability::QueueCounts;
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};

macro_rules! columns {
    () => {
        "id, name, args, scheduled_at, state, started_at, completed_at, error"
    };
}

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS spindle_tasks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    args TEXT NOT NULL,
    scheduled_at TEXT NOT NULL,
    state TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    error TEXT
)";

const CREATE_CLAIM_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_spindle_tasks_claim ON spindle_tasks(state, scheduled_at, seq)";

const INSERT: &str = concat!(
    "INSERT INTO spindle_tasks (id, name, args, scheduled_at, state) VALUES (?, ?, ?, ?, ?) RETURNING ",
    columns!()
);

const SELECT_OLDEST: &str = concat!(
    "SELECT ",
    columns!(),
    " FROM spindle_tasks WHERE state = ? ORDER BY scheduled_at ASC, seq ASC LIMIT 1"
);

const SELECT_BY_ID: &str = concat!("SELECT ", columns!(), " FROM spindle_tasks WHERE id = ?");

// Candidate selection and the guarded update are one statement, so no other
// writer can slip in between them.
const CLAIM: &str = concat!(
    "UPDATE spindle_tasks SET state = ?, started_at = ? ",
    "WHERE seq = (SELECT seq FROM spindle_tasks WHERE state = ? ORDER BY scheduled_at ASC, seq ASC LIMIT 1) ",
    "AND state = ? RETURNING ",
    columns!()
);

const MARK_RUNNING: &str = concat!(
    "UPDATE spindle_tasks SET state = ?, started_at = ? WHERE id = ? AND state = ? RETURNING ",
    columns!()
);

const MARK_FINISHED: &str = concat!(
    "UPDATE spindle_tasks SET state = ?, completed_at = ?, error = ? WHERE id = ? AND state = ? RETURNING ",
    columns!()
);

/// SQLite-backed task table.
#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl SqliteTaskStore {
    /// Open (or create) the database described by `config`.
    ///
    /// In-memory URLs get the same single pinned connection as [`Self::in_memory`],
    /// whatever `max_connections` says.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?;
        if is_in_memory(&config.database_url) {
            return Self::pinned(options).await;
        }

        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// A private in-memory database, mostly for tests.
    ///
    /// Every SQLite connection to `:memory:` sees its own database, so the pool
    /// is pinned to one connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        Self::pinned(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn pinned(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Self {
            pool,
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Replace the time source (and the id generator that reads it).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_CLAIM_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    fn now(&self) -> String {
        encode_ts(self.clock.now())
    }

    /// Zero rows matched a guarded update: tell "gone" from "moved on".
    async fn explain_miss(&self, id: TaskId, expected: TaskState) -> QueueError {
        let actual = sqlx::query("SELECT state FROM spindle_tasks WHERE id = ?")
            .bind(encode_id(id))
            .fetch_optional(&self.pool)
            .await;

        match actual {
            Ok(None) => QueueError::NotFound {
                task_id: Some(id),
                expected: Some(expected),
            },
            Ok(Some(row)) => match row.try_get::<String, _>("state").and_then(|s| decode_state(&s)) {
                Ok(actual) => QueueError::StaleState {
                    task_id: id,
                    expected,
                    actual,
                },
                Err(e) => QueueError::from(e),
            },
            Err(e) => QueueError::from(e),
        }
    }

    async fn finish(&self, id: TaskId, to: TaskState, error: Option<&str>) -> Result<Task> {
        let row = sqlx::query(MARK_FINISHED)
            .bind(to.as_str())
            .bind(self.now())
            .bind(error)
            .bind(encode_id(id))
            .bind(TaskState::Running.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let task = task_from_row(&row)?;
                debug!(task_id = %task.id, state = %task.state, "task finished");
                Ok(task)
            }
            None => Err(self.explain_miss(id, TaskState::Running).await),
        }
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn enqueue(&self, name: &TaskName, args: String) -> Result<Task> {
        let id = self.ids.generate_task_id();
        let row = sqlx::query(INSERT)
            .bind(encode_id(id))
            .bind(name.as_str())
            .bind(args)
            .bind(self.now())
            .bind(TaskState::Scheduled.as_str())
            .fetch_one(&self.pool)
            .await?;

        let task = task_from_row(&row)?;
        debug!(task_id = %task.id, task_name = %task.name, "task scheduled");
        Ok(task)
    }

    async fn claim_next(&self) -> Result<Task> {
        let row = sqlx::query(SELECT_OLDEST)
            .bind(TaskState::Scheduled.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(task_from_row(&row)?),
            None => Err(QueueError::NotFound {
                task_id: None,
                expected: Some(TaskState::Scheduled),
            }),
        }
    }

    async fn claim(&self) -> Result<Task> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(CLAIM)
            .bind(TaskState::Running.as_str())
            .bind(self.now())
            .bind(TaskState::Scheduled.as_str())
            .bind(TaskState::Scheduled.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(QueueError::NotFound {
                task_id: None,
                expected: Some(TaskState::Scheduled),
            });
        };

        let task = task_from_row(&row)?;
        tx.commit().await?;

        debug!(task_id = %task.id, task_name = %task.name, "task claimed");
        Ok(task)
    }

    async fn mark_running(&self, id: TaskId) -> Result<Task> {
        let row = sqlx::query(MARK_RUNNING)
            .bind(TaskState::Running.as_str())
            .bind(self.now())
            .bind(encode_id(id))
            .bind(TaskState::Scheduled.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(task_from_row(&row)?),
            None => Err(self.explain_miss(id, TaskState::Scheduled).await),
        }
    }

    async fn mark_succeeded(&self, id: TaskId) -> Result<Task> {
        self.finish(id, TaskState::Succeeded, None).await
    }

    async fn mark_failed(&self, id: TaskId, error: &str) -> Result<Task> {
        self.finish(id, TaskState::Failed, Some(error)).await
    }

    async fn get(&self, id: TaskId) -> Result<Task> {
        let row = sqlx::query(SELECT_BY_ID)
            .bind(encode_id(id))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(task_from_row(&row)?),
            None => Err(QueueError::NotFound {
                task_id: Some(id),
                expected: None,
            }),
        }
    }

    async fn counts_by_state(&self) -> Result<QueueCounts> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS n FROM spindle_tasks GROUP BY state")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let state = decode_state(&row.try_get::<String, _>("state")?)?;
            let n: i64 = row.try_get("n")?;
            counts.add(state, usize::try_from(n).unwrap_or_default());
        }
        Ok(counts)
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn encode_id(id: TaskId) -> String {
    id.as_ulid().to_string()
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_err<E>(e: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(e))
}

fn decode_ts(raw: &str) -> std::result::Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(decode_err)
}

fn decode_state(raw: &str) -> std::result::Result<TaskState, sqlx::Error> {
    raw.parse().map_err(decode_err)
}

fn task_from_row(row: &SqliteRow) -> std::result::Result<Task, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    let scheduled_at: String = row.try_get("scheduled_at")?;
    let state: String = row.try_get("state")?;
    let started_at: Option<String> = row.try_get("started_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;

    Ok(Task {
        id: id.parse().map_err(decode_err)?,
        name: TaskName::new(name),
        args: row.try_get("args")?,
        scheduled_at: decode_ts(&scheduled_at)?,
        state: decode_state(&state)?,
        started_at: started_at.as_deref().map(decode_ts).transpose()?,
        completed_at: completed_at.as_deref().map(decode_ts).transpose()?,
        error: row.try_get("error")?,
    })
}
