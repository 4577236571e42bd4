//! WorkerLoop - タスク実行ループ
//!
//! # フロー（1 サイクル）
//! 1. exit 要求があれば終了（サイクルの先頭でのみ確認）
//! 2. TaskStore::claim() で最古の scheduled を running にする
//! 3. registry から handler を引く（なければ Failed）
//! 4. handler を実行 → Succeeded / Failed を記録（panic も Failed）
//! 5. 記録に失敗したら log のみ（task は running のまま残る）
//!
//! 何もなかったとき・store エラーのときは `poll_interval` だけ待つ。
//! これがシステム内で唯一のリトライ。

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{Instrument, error, info, warn};

use super::handler::ExecutionContext;
use super::registry::HandlerRegistry;
use crate::config::WorkerConfig;
use crate::domain::{QueueError, Task, TaskId};
use crate::observability::task_span;
use crate::ports::TaskStore;

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was ready.
    Idle,
    /// The claim failed on a storage error.
    StoreUnavailable,
    Succeeded(TaskId),
    /// The handler returned an error or panicked.
    Failed(TaskId),
    /// No handler was registered; the task was marked failed.
    HandlerMissing(TaskId),
    /// The terminal transition could not be written; the row stays `Running`.
    Stranded(TaskId),
}

impl CycleOutcome {
    /// Cycles after which the loop pauses before polling again.
    pub fn should_back_off(self) -> bool {
        matches!(self, CycleOutcome::Idle | CycleOutcome::StoreUnavailable)
    }
}

/// One-shot, cooperative stop signal. Cloning shares the signal.
#[derive(Clone)]
pub struct ExitHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ExitHandle {
    /// Ask the loop to stop before its next claim. Calling it again is harmless.
    pub fn request_exit(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

pub struct WorkerLoop {
    store: Arc<dyn TaskStore>,
    registry: HandlerRegistry,
    config: WorkerConfig,
    exit_tx: Arc<watch::Sender<bool>>,
}

impl WorkerLoop {
    pub fn new(store: Arc<dyn TaskStore>, registry: HandlerRegistry, config: WorkerConfig) -> Self {
        let (exit_tx, _) = watch::channel(false);
        Self {
            store,
            registry,
            config,
            exit_tx: Arc::new(exit_tx),
        }
    }

    pub fn exit_handle(&self) -> ExitHandle {
        ExitHandle {
            tx: Arc::clone(&self.exit_tx),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run cycles until exit is requested.
    ///
    /// A handler that is executing when exit is requested runs to completion;
    /// the backoff pause, on the other hand, is cut short.
    pub async fn run(&self) {
        let mut exit_rx = self.exit_tx.subscribe();
        info!(
            worker_id = %self.config.worker_id,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "worker started"
        );

        loop {
            if *exit_rx.borrow_and_update() {
                break;
            }

            let outcome = self.run_once().await;
            if outcome.should_back_off() {
                tokio::select! {
                    _ = exit_rx.changed() => {}
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "worker exiting");
    }

    /// One claim → execute → record cycle.
    pub async fn run_once(&self) -> CycleOutcome {
        let task = match self.store.claim().await {
            Ok(task) => task,
            Err(e) if e.is_lost_race() => {
                warn!(
                    worker_id = %self.config.worker_id,
                    "no task ready, sleeping for {:?}",
                    self.config.poll_interval
                );
                return CycleOutcome::Idle;
            }
            Err(e) => {
                error!(worker_id = %self.config.worker_id, error = %e, "failed to fetch task to run");
                return CycleOutcome::StoreUnavailable;
            }
        };

        let span = task_span(&task, &self.config.worker_id);
        self.execute(task).instrument(span).await
    }

    async fn execute(&self, task: Task) -> CycleOutcome {
        let Some(handler) = self.registry.lookup(&task.name) else {
            let absent = QueueError::HandlerAbsent {
                task_id: task.id,
                name: task.name.clone(),
            };
            warn!(error = %absent, "execute task function not found");
            return match self.store.mark_failed(task.id, &absent.to_string()).await {
                Ok(_) => CycleOutcome::HandlerMissing(task.id),
                Err(e) => self.stranded(task.id, e),
            };
        };

        let ctx = ExecutionContext {
            worker_id: self.config.worker_id.clone(),
            claimed_at: task.started_at.unwrap_or_else(Utc::now),
        };

        // 別タスクで実行し、panic も task の失敗として扱う
        let started = Instant::now();
        let result = {
            let task = task.clone();
            tokio::spawn(async move { handler.handle(&ctx, &task).await }.in_current_span()).await
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = result.unwrap_or_else(|join_err| Err(anyhow::anyhow!(join_failure(join_err))));

        match result {
            Ok(()) => match self.store.mark_succeeded(task.id).await {
                Ok(_) => {
                    info!(elapsed_ms, "task succeeded");
                    CycleOutcome::Succeeded(task.id)
                }
                Err(e) => self.stranded(task.id, e),
            },
            Err(err) => {
                let message = format!("{err:#}");
                let failure = QueueError::HandlerFailed {
                    task_id: task.id,
                    message: message.clone(),
                };
                warn!(elapsed_ms, error = %failure, "failed to execute task");

                match self.store.mark_failed(task.id, &message).await {
                    Ok(_) => CycleOutcome::Failed(task.id),
                    Err(e) => self.stranded(task.id, e),
                }
            }
        }
    }

    fn stranded(&self, task_id: TaskId, e: QueueError) -> CycleOutcome {
        error!(
            %task_id,
            error = %e,
            "failed to record task outcome; task left running"
        );
        CycleOutcome::Stranded(task_id)
    }
}

fn join_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("handler did not complete: {err}");
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("handler panicked: {message}")
}
