//! TaskStore port - タスク行の正本（source of truth）
//!
//! # 設計原則
//! - 状態遷移はすべて `WHERE state = <expected>` で守られた条件付き更新
//! - 競合に負けた側は 0 行更新となり `NotFound` / `StaleState` を受け取る
//! - claim は 1 トランザクション内で「最古の scheduled を探す + running にする」

use async_trait::async_trait;

use crate::domain::{Result, Task, TaskId, TaskName};
use crate::observability::QueueCounts;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new row in `Scheduled` with a fresh id and `scheduled_at = now`.
    /// `args` is already serialized.
    async fn enqueue(&self, name: &TaskName, args: String) -> Result<Task>;

    /// Oldest `Scheduled` row by `scheduled_at`, without changing it.
    async fn claim_next(&self) -> Result<Task>;

    /// Find the oldest `Scheduled` row and move it to `Running` as one
    /// atomic unit. Exactly one of several concurrent callers gets a given row.
    async fn claim(&self) -> Result<Task>;

    /// `Scheduled -> Running`, sets `started_at`.
    async fn mark_running(&self, id: TaskId) -> Result<Task>;

    /// `Running -> Succeeded`, sets `completed_at`.
    async fn mark_succeeded(&self, id: TaskId) -> Result<Task>;

    /// `Running -> Failed`, sets `completed_at` and `error`.
    async fn mark_failed(&self, id: TaskId, error: &str) -> Result<Task>;

    async fn get(&self, id: TaskId) -> Result<Task>;

    async fn counts_by_state(&self) -> Result<QueueCounts>;
}
