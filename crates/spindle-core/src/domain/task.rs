use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{TaskId, TaskState};

/// Name under which a handler is registered.
///
/// Not validated against the registry when a task is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskName(String);

impl TaskName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A task row as stored.
///
/// `args` is the serialized JSON payload; the store never looks inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: TaskName,
    pub args: String,
    pub scheduled_at: DateTime<Utc>,
    pub state: TaskState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Task {
    /// Decode `args` into the shape the handler expects.
    pub fn read_args<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.args)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ulid::Ulid;

    fn task_with_args(args: &str) -> Task {
        Task {
            id: TaskId::from_ulid(Ulid::new()),
            name: TaskName::new("echo"),
            args: args.to_string(),
            scheduled_at: Utc::now(),
            state: TaskState::Scheduled,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Greeting {
        name: String,
    }

    #[test]
    fn read_args_decodes_payload() {
        let task = task_with_args(r#"{"name":"spindle"}"#);
        let greeting: Greeting = task.read_args().unwrap();
        assert_eq!(
            greeting,
            Greeting {
                name: "spindle".to_string()
            }
        );

        let raw: serde_json::Value = task.read_args().unwrap();
        assert_eq!(raw, json!({"name": "spindle"}));
    }

    #[test]
    fn read_args_reports_shape_mismatch() {
        let task = task_with_args(r#"{"x":1}"#);
        assert!(task.read_args::<Greeting>().is_err());
    }

    #[test]
    fn task_name_serializes_as_plain_string() {
        let s = serde_json::to_string(&TaskName::new("echo")).unwrap();
        assert_eq!(s, "\"echo\"");
    }
}
