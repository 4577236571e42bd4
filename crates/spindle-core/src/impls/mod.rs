//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SqliteTaskStore**: SQLite（sqlx）上の TaskStore

pub mod sqlite_store;

pub use self::sqlite_store::SqliteTaskStore;
