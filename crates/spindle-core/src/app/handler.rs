//! TaskHandler - タスク名に紐づく実行関数
//!
//! ワーカーは handler を不透明な能力として扱う。`Ok(())` なら Succeeded、
//! `Err` ならそのメッセージがそのまま task の `error` に記録される。

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::Task;

/// What the worker knows about the current execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub worker_id: String,
    pub claimed_at: DateTime<Utc>,
}

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, ctx: &ExecutionContext, task: &Task) -> anyhow::Result<()>;
}

/// Adapts an async closure into a `TaskHandler`.
///
/// The closure receives owned copies so the returned future can be `'static`.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(ExecutionContext, Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: &ExecutionContext, task: &Task) -> anyhow::Result<()> {
        (self.f)(ctx.clone(), task.clone()).await
    }
}
