//! App - アプリケーション層
//!
//! ports を組み合わせてキューの振る舞いを実装します。
//!
//! # 主要コンポーネント
//! - **Scheduler**: タスクの投入（producer 側）
//! - **HandlerRegistry**: タスク名 → handler
//! - **WorkerLoop**: タスク実行ループ（claim→handle→record）

pub mod handler;
pub mod registry;
pub mod scheduler;
pub mod worker_loop;

pub use self::handler::{ExecutionContext, FnHandler, TaskHandler};
pub use self::registry::HandlerRegistry;
pub use self::scheduler::Scheduler;
pub use self::worker_loop::{CycleOutcome, ExitHandle, WorkerLoop};
