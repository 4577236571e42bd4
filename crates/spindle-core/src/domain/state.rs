//! Task state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a persisted task.
///
/// State transitions:
/// - Scheduled -> Running -> Succeeded
/// - Scheduled -> Running -> Failed
///
/// Transitions are one-directional: nothing ever re-enters `Scheduled` or
/// `Running` after leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting to be claimed.
    Scheduled,

    /// Claimed by exactly one worker.
    Running,

    /// Handler completed without error.
    Succeeded,

    /// Handler missing or reported an error.
    Failed,
}

impl TaskState {
    pub const ALL: [TaskState; 4] = [
        TaskState::Scheduled,
        TaskState::Running,
        TaskState::Succeeded,
        TaskState::Failed,
    ];

    /// Column value used by the store.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Scheduled => "scheduled",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
        }
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }

    /// Is this task eligible for a claim?
    pub fn is_claimable(self) -> bool {
        matches!(self, TaskState::Scheduled)
    }

    pub fn can_transition_to(self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Scheduled, TaskState::Running)
                | (TaskState::Running, TaskState::Succeeded)
                | (TaskState::Running, TaskState::Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task state `{0}`")]
pub struct UnknownState(pub String);

impl FromStr for TaskState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TaskState::Scheduled, TaskState::Running, true)]
    #[case(TaskState::Running, TaskState::Succeeded, true)]
    #[case(TaskState::Running, TaskState::Failed, true)]
    #[case(TaskState::Scheduled, TaskState::Succeeded, false)]
    #[case(TaskState::Scheduled, TaskState::Failed, false)]
    #[case(TaskState::Running, TaskState::Scheduled, false)]
    #[case(TaskState::Succeeded, TaskState::Running, false)]
    #[case(TaskState::Failed, TaskState::Scheduled, false)]
    #[case(TaskState::Succeeded, TaskState::Failed, false)]
    fn transitions_are_one_directional(
        #[case] from: TaskState,
        #[case] to: TaskState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn only_scheduled_is_claimable() {
        let claimable: Vec<_> = TaskState::ALL
            .into_iter()
            .filter(|s| s.is_claimable())
            .collect();
        assert_eq!(claimable, vec![TaskState::Scheduled]);
    }

    #[test]
    fn column_values_parse_back() {
        for state in TaskState::ALL {
            assert_eq!(state.as_str().parse::<TaskState>().unwrap(), state);
        }
        assert!("dead".parse::<TaskState>().is_err());
    }

    #[test]
    fn serde_matches_column_values() {
        let s = serde_json::to_string(&TaskState::Succeeded).unwrap();
        assert_eq!(s, "\"succeeded\"");
    }
}
