//! HandlerRegistry - タスク名 → handler の対応表
//!
//! プロセス内の共有オブジェクト（グローバルではない）。ワーカーに明示的に渡し、
//! ワーカーが動いている間も `register` できる。登録は後勝ち。

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::handler::{ExecutionContext, FnHandler, TaskHandler};
use crate::domain::{Task, TaskName};
use crate::typed::{Handler, TaskArgs, TypedHandler};

/// Cloning shares the same underlying map.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<TaskName, Arc<dyn TaskHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, silently replacing any earlier one.
    /// Returns the replaced handler.
    pub fn register(
        &self,
        name: impl Into<TaskName>,
        handler: impl TaskHandler + 'static,
    ) -> Option<Arc<dyn TaskHandler>> {
        self.register_arc(name.into(), Arc::new(handler))
    }

    pub fn register_arc(
        &self,
        name: TaskName,
        handler: Arc<dyn TaskHandler>,
    ) -> Option<Arc<dyn TaskHandler>> {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let previous = handlers.insert(name.clone(), handler);
        if previous.is_some() {
            debug!(task_name = %name, "handler replaced");
        }
        previous
    }

    /// Register an async closure.
    pub fn register_fn<F, Fut>(&self, name: impl Into<TaskName>, f: F) -> Option<Arc<dyn TaskHandler>>
    where
        F: Fn(ExecutionContext, Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(name, FnHandler::new(f))
    }

    /// Register a typed handler under `T::NAME`.
    pub fn register_typed<T, H>(&self, handler: H) -> Option<Arc<dyn TaskHandler>>
    where
        T: TaskArgs,
        H: Handler<T> + 'static,
    {
        self.register(T::NAME, TypedHandler::<T, H>::new(handler))
    }

    pub fn lookup(&self, name: &TaskName) -> Option<Arc<dyn TaskHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &TaskName) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<TaskName> {
        let mut names: Vec<_> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
