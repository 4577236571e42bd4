//! spindle - SQLite-backed task queue CLI.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use spindle_core::{
    ExecutionContext, Handler, HandlerRegistry, Scheduler, SqliteTaskStore, StoreConfig,
    TaskArgs, TaskId, TaskStore, WorkerConfig, WorkerLoop,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spindle")]
#[command(about = "Durable background tasks on SQLite", long_about = None)]
struct Cli {
    /// SQLite database URL
    #[arg(long, env = "SPINDLE_DATABASE_URL", default_value = "sqlite://spindle.db")]
    database_url: String,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule a task
    Enqueue {
        /// Task name
        name: String,
        /// JSON args
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Run a worker until Ctrl-C
    Work {
        /// Seconds to wait after an idle cycle or a store error
        #[arg(long, env = "SPINDLE_POLL_INTERVAL_SECS", default_value = "10")]
        poll_interval_secs: u64,
        #[arg(long, env = "SPINDLE_WORKER_ID", default_value = "worker-0")]
        worker_id: String,
    },
    /// Show task details
    Show {
        /// Task ID (`task-<ulid>` or bare ULID)
        id: String,
    },
    /// Show per-state task counts
    Status,
}

/// `fail` demo: fails with `reason`.
#[derive(Debug, Serialize, Deserialize)]
struct FailArgs {
    #[serde(default = "default_reason")]
    reason: String,
}

fn default_reason() -> String {
    "failed on purpose".to_string()
}

impl TaskArgs for FailArgs {
    const NAME: &'static str = "fail";
}

struct FailHandler;

#[async_trait]
impl Handler<FailArgs> for FailHandler {
    async fn handle(&self, _ctx: &ExecutionContext, args: FailArgs) -> Result<()> {
        anyhow::bail!(args.reason)
    }
}

fn demo_registry() -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    registry.register_fn("echo", |ctx, task| async move {
        let args: serde_json::Value = task.read_args().context("echo expects JSON args")?;
        info!(worker_id = %ctx.worker_id, %args, "echo");
        Ok(())
    });
    registry.register_typed::<FailArgs, _>(FailHandler);
    registry
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "spindle=debug,spindle_core=debug,spindle_cli=debug"
    } else {
        "spindle=info,spindle_core=info,spindle_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env は任意
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let store = SqliteTaskStore::connect(&StoreConfig::new(&cli.database_url))
        .await
        .with_context(|| format!("failed to open {}", cli.database_url))?;
    let store: Arc<dyn TaskStore> = Arc::new(store);

    match cli.command {
        Commands::Enqueue { name, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("args must be valid JSON")?;
            let task = Scheduler::new(store).schedule_task(name, &args).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Commands::Work {
            poll_interval_secs,
            worker_id,
        } => {
            let config = WorkerConfig::default()
                .with_worker_id(worker_id)
                .with_poll_interval(Duration::from_secs(poll_interval_secs));
            let worker = WorkerLoop::new(store, demo_registry(), config);

            let exit = worker.exit_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("ctrl-c received, finishing current task");
                    exit.request_exit();
                }
            });

            worker.run().await;
        }
        Commands::Show { id } => {
            let id: TaskId = id.parse().with_context(|| format!("invalid task id: {id}"))?;
            let task = store.get(id).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Commands::Status => {
            let counts = store.counts_by_state().await?;
            println!("scheduled: {}", counts.scheduled);
            println!("running:   {}", counts.running);
            println!("succeeded: {}", counts.succeeded);
            println!("failed:    {}", counts.failed);
            println!("total:     {}", counts.total());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_core::{CycleOutcome, TaskState};

    #[test]
    fn parses_enqueue_with_default_args() {
        let cli = Cli::try_parse_from(["spindle", "enqueue", "echo"]).unwrap();
        match cli.command {
            Commands::Enqueue { name, args } => {
                assert_eq!(name, "echo");
                assert_eq!(args, "{}");
            }
            _ => panic!("expected enqueue"),
        }
    }

    #[tokio::test]
    async fn demo_handlers_succeed_and_fail() {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::in_memory().await.unwrap());
        let scheduler = Scheduler::new(Arc::clone(&store));
        let worker = WorkerLoop::new(Arc::clone(&store), demo_registry(), WorkerConfig::default());

        let echo = scheduler
            .schedule_task("echo", &serde_json::json!({"hello": "world"}))
            .await
            .unwrap();
        let fail = scheduler
            .schedule(&FailArgs {
                reason: "disk full".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(worker.run_once().await, CycleOutcome::Succeeded(echo.id));
        assert_eq!(worker.run_once().await, CycleOutcome::Failed(fail.id));

        let failed = store.get(fail.id).await.unwrap();
        assert_eq!(failed.state, TaskState::Failed);
        assert_eq!(failed.error.as_deref(), Some("disk full"));
    }
}
