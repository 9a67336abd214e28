use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tickvisor::{
    Config, CoordinationStore, EXIT_STARTUP_FAILED, FsStore, LogWriter, Scheduler, SignalMap,
    Subscribe, ViolationPolicy, WorkerAgent, WorkerSpec,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tickvisor", version, about = "Tick scheduler and worker supervisor")]
struct Cli {
    /// Coordination store directory
    #[arg(long, env = "TICKVISOR_STORE", global = true, default_value = "/run/tickvisor")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Supervise the workers listed in the store's `workers` file
    Run {
        /// Tick period in microseconds
        #[arg(long, env = "TICKVISOR_PERIOD_US", default_value_t = 1000)]
        period_us: u64,

        /// How to spawn a worker, as NAME=COMMAND [ARGS...]; unlisted workers are attached by name
        #[arg(long = "spawn", value_name = "NAME=COMMAND")]
        spawn: Vec<WorkerSpec>,

        /// End the run after this many consecutive misses by one worker (0 = never)
        #[arg(long, env = "TICKVISOR_ESCALATE_AFTER", default_value_t = 0)]
        escalate_after: u32,

        /// Run the scheduler under SCHED_FIFO at this priority (1-99)
        #[arg(long, env = "TICKVISOR_SCHED_FIFO")]
        sched_fifo: Option<i32>,

        /// Process-table rescan interval while attaching, in milliseconds
        #[arg(long, default_value_t = 1000)]
        attach_poll_ms: u64,
    },

    /// Reference worker: follows the tick protocol and simulates work
    Worker {
        /// Simulated work per tick, in microseconds
        #[arg(long, default_value_t = 0)]
        work_us: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run {
            period_us,
            spawn,
            escalate_after,
            sched_fifo,
            attach_poll_ms,
        } => {
            let cfg = Config {
                period: Duration::from_micros(period_us),
                violations: ViolationPolicy::escalate_after(escalate_after),
                attach_poll: Duration::from_millis(attach_poll_ms),
                realtime_priority: sched_fifo,
                ..Config::default()
            };
            run(cli.store, cfg, spawn).await
        }
        Commands::Worker { work_us } => worker(cli.store, Duration::from_micros(work_us)).await,
    };

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX)),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_STARTUP_FAILED as u8)
        }
    }
}

async fn run(root: PathBuf, cfg: Config, catalog: Vec<WorkerSpec>) -> anyhow::Result<i32> {
    let store = Arc::new(
        FsStore::open(&root).with_context(|| format!("failed to open store {}", root.display()))?,
    );
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let scheduler = Scheduler::builder(cfg, store.clone())
        .with_subscribers(subs)
        .build();

    let specs = match scheduler.resolve(&catalog).await {
        Ok(specs) if !specs.is_empty() => specs,
        Ok(_) if !catalog.is_empty() => catalog,
        // The lock was taken by open; nothing else was started yet.
        Ok(_) => {
            let _ = store.release().await;
            anyhow::bail!(
                "no workers: list them in {} or pass --spawn",
                root.join("workers").display()
            );
        }
        Err(e) => {
            let _ = store.release().await;
            return Err(e).context("failed to read worker list");
        }
    };

    let report = scheduler.run(specs).await.context("startup failed")?;
    info!(
        exit = %report.exit,
        ticks = report.ticks,
        violations = report.violations,
        "run finished"
    );
    Ok(report.exit_code())
}

async fn worker(root: PathBuf, work: Duration) -> anyhow::Result<i32> {
    let store = Arc::new(FsStore::connect(&root));
    let mut agent =
        WorkerAgent::from_env(store, SignalMap::default()).context("not started by tickvisor")?;
    let name = agent.name().to_string();

    let handled = agent
        .run(|_| async move {
            if !work.is_zero() {
                tokio::time::sleep(work).await;
            }
        })
        .await
        .with_context(|| format!("worker {name} failed"))?;
    info!(worker = %name, handled, "worker stopped");
    Ok(0)
}
