//! Handler trait - 型付き args を受け取る handler
//!
//! `TypedHandler<T, H>` が `Task::args` を `T` にデコードしてから `H` を呼ぶ。
//! デコード失敗は handler の失敗として task に記録される。

use std::marker::PhantomData;

use anyhow::Context;
use async_trait::async_trait;

use super::args::TaskArgs;
use crate::app::{ExecutionContext, TaskHandler};
use crate::domain::Task;

/// # 使用例
/// ```ignore
/// struct Resizer;
///
/// #[async_trait]
/// impl Handler<Resize> for Resizer {
///     async fn handle(&self, ctx: &ExecutionContext, args: Resize) -> anyhow::Result<()> {
///         resize(args.width, args.height)
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: TaskArgs>: Send + Sync {
    async fn handle(&self, ctx: &ExecutionContext, args: T) -> anyhow::Result<()>;
}

pub struct TypedHandler<T: TaskArgs, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TaskArgs, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TaskArgs, H: Handler<T>> TaskHandler for TypedHandler<T, H> {
    async fn handle(&self, ctx: &ExecutionContext, task: &Task) -> anyhow::Result<()> {
        let args: T = task
            .read_args()
            .with_context(|| format!("invalid args for {}", T::NAME))?;
        self.handler.handle(ctx, args).await
    }
}
