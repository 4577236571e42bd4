//! Typed - 型付き Task API
//!
//! task 名の typo を型で排除し、args のデコードを handler から切り離す。
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskArgs` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `TaskHandler` trait - object-safe, registry に格納される

pub mod args;
pub mod handler;

pub use self::args::TaskArgs;
pub use self::handler::{Handler, TypedHandler};
