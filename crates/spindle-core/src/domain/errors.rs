//! Errors - エラー型と分類
//!
//! すべての失敗はワーカーの 1 サイクル内に閉じ込められる。ループ自体を止めるのは
//! 明示的な exit 要求だけ。

use super::{TaskId, TaskName, TaskState};

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// No row matched. `task_id` is `None` when the lookup was "oldest
    /// claimable row" rather than a specific id.
    #[error("no task found{}", fmt_filter(.task_id, .expected))]
    NotFound {
        task_id: Option<TaskId>,
        expected: Option<TaskState>,
    },

    /// The row exists but a competitor already moved it on.
    #[error("task {task_id} is {actual}, expected {expected}")]
    StaleState {
        task_id: TaskId,
        expected: TaskState,
        actual: TaskState,
    },

    #[error("persistence error: {source}")]
    Persistence {
        #[from]
        source: sqlx::Error,
    },

    #[error("handler not found for task name `{name}` ({task_id})")]
    HandlerAbsent { task_id: TaskId, name: TaskName },

    #[error("handler failed for {task_id}: {message}")]
    HandlerFailed { task_id: TaskId, message: String },

    #[error("task args could not be serialized: {source}")]
    InvalidArgs {
        #[source]
        source: serde_json::Error,
    },
}

fn fmt_filter(task_id: &Option<TaskId>, expected: &Option<TaskState>) -> String {
    let mut out = String::new();
    if let Some(id) = task_id {
        out.push_str(&format!(" for {id}"));
    }
    if let Some(state) = expected {
        out.push_str(&format!(" in state {state}"));
    }
    out
}

impl QueueError {
    /// `NotFound` and `StaleState` both mean "someone else got there first or
    /// there was nothing to get"; callers retreat and poll again.
    pub fn is_lost_race(&self) -> bool {
        matches!(
            self,
            QueueError::NotFound { .. } | QueueError::StaleState { .. }
        )
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, QueueError::Persistence { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn not_found_without_id_reads_naturally() {
        let err = QueueError::NotFound {
            task_id: None,
            expected: Some(TaskState::Scheduled),
        };
        assert_eq!(err.to_string(), "no task found in state scheduled");
        assert!(err.is_lost_race());
    }

    #[test]
    fn not_found_by_id_names_the_task() {
        let id = TaskId::from_ulid(Ulid::new());
        let err = QueueError::NotFound {
            task_id: Some(id),
            expected: None,
        };
        assert_eq!(err.to_string(), format!("no task found for {id}"));
        assert!(err.is_lost_race());
    }

    #[test]
    fn stale_state_is_a_lost_race() {
        let id = TaskId::from_ulid(Ulid::new());
        let err = QueueError::StaleState {
            task_id: id,
            expected: TaskState::Scheduled,
            actual: TaskState::Running,
        };
        assert!(err.is_lost_race());
        assert!(!err.is_persistence());
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn persistence_wraps_sqlx() {
        let err = QueueError::from(sqlx::Error::PoolClosed);
        assert!(err.is_persistence());
        assert!(!err.is_lost_race());
    }
}
