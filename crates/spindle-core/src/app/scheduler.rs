//! Scheduler - producer 側の唯一の入口
//!
//! handler が登録済みかどうかは確認しない。producer と worker は別々に
//! デプロイされうるため、未登録の名前は実行時に Failed として表面化する。

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{QueueError, Result, Task, TaskName};
use crate::ports::TaskStore;
use crate::typed::TaskArgs;

#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn TaskStore>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Serialize `args` and store a new `Scheduled` task.
    pub async fn schedule_task<A>(&self, name: impl Into<TaskName>, args: &A) -> Result<Task>
    where
        A: Serialize + ?Sized,
    {
        let args = serde_json::to_string(args).map_err(|source| QueueError::InvalidArgs { source })?;
        self.store.enqueue(&name.into(), args).await
    }

    pub async fn schedule<T: TaskArgs>(&self, args: &T) -> Result<Task> {
        self.schedule_task(T::NAME, args).await
    }
}
