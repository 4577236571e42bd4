//! Store and worker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// e.g. `sqlite://spindle.db`; the file is created if missing.
    pub database_url: String,
    pub max_connections: u32,
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://spindle.db".to_string(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Shows up in logs and in the handler's execution context.
    pub worker_id: String,
    /// Pause after an idle cycle or a store error.
    pub poll_interval: Duration,
}

impl WorkerConfig {
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-0".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_defaults_to_ten_second_backoff() {
        assert_eq!(WorkerConfig::default().poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: WorkerConfig = serde_json::from_str(r#"{"worker_id":"w-7"}"#).unwrap();
        assert_eq!(cfg.worker_id, "w-7");
        assert_eq!(cfg.poll_interval, DEFAULT_POLL_INTERVAL);

        let store: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(store.database_url, "sqlite://spindle.db");
    }

    #[test]
    fn store_never_runs_without_a_connection() {
        let cfg = StoreConfig::new("sqlite::memory:").with_max_connections(0);
        assert_eq!(cfg.max_connections, 1);
    }
}
