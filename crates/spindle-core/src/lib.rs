//! spindle-core
//!
//! Durable, SQLite-backed background task queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, Clock, IdGenerator）
//! - **impls**: 実装（SqliteTaskStore）
//! - **app**: Scheduler, HandlerRegistry, WorkerLoop
//! - **typed**: 型付き API（TaskArgs, Handler）
//! - **config**: StoreConfig, WorkerConfig
//! - **observability**: tracing span とキューの集計

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;

pub use app::{
    CycleOutcome, ExecutionContext, ExitHandle, HandlerRegistry, Scheduler, TaskHandler,
    WorkerLoop,
};
pub use config::{StoreConfig, WorkerConfig};
pub use domain::{QueueError, Result, Task, TaskId, TaskName, TaskState};
pub use impls::SqliteTaskStore;
pub use observability::QueueCounts;
pub use ports::TaskStore;
pub use typed::{Handler, TaskArgs};
