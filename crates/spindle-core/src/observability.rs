use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::domain::{Task, TaskState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub scheduled: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn add(&mut self, state: TaskState, n: usize) {
        match state {
            TaskState::Scheduled => self.scheduled += n,
            TaskState::Running => self.running += n,
            TaskState::Succeeded => self.succeeded += n,
            TaskState::Failed => self.failed += n,
        }
    }

    pub fn get(&self, state: TaskState) -> usize {
        match state {
            TaskState::Scheduled => self.scheduled,
            TaskState::Running => self.running,
            TaskState::Succeeded => self.succeeded,
            TaskState::Failed => self.failed,
        }
    }

    pub fn total(&self) -> usize {
        self.scheduled + self.running + self.succeeded + self.failed
    }
}

/// Span wrapping everything a worker does with one claimed task.
pub fn task_span(task: &Task, worker_id: &str) -> Span {
    tracing::info_span!(
        "task",
        task_id = %task.id,
        task_name = %task.name,
        worker_id = %worker_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_per_state() {
        let mut counts = QueueCounts::default();
        counts.add(TaskState::Scheduled, 2);
        counts.add(TaskState::Failed, 1);
        counts.add(TaskState::Scheduled, 1);

        assert_eq!(counts.get(TaskState::Scheduled), 3);
        assert_eq!(counts.get(TaskState::Failed), 1);
        assert_eq!(counts.get(TaskState::Running), 0);
        assert_eq!(counts.total(), 4);
    }
}
