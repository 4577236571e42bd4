//! Ports - 抽象化レイヤー
//!
//! 外部システム（リレーショナルストア、時計、ID 生成）へのインターフェース。
//! 実装は `impls` に置く。

pub mod clock;
pub mod id_generator;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::TaskStore;
