//! Scheduler loop — periodic discovery and parallel dispatch of queued
//! tasks.
//!
//! `TaskProcessor` owns the whole lifecycle: `start()` runs crash recovery
//! and then spawns the periodic loop, `stop()` cancels it. Each tick lists
//! queued tasks oldest-first, spawns one executor per task, and joins them
//! all before the tick completes — ticks never overlap, and a task claimed
//! in one tick no longer matches the queued filter in the next.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ProcessorConfig;
use crate::processor::executor::{ExecutorDeps, execute_one};
use crate::processor::recovery::recover_stranded_tasks;
use crate::processor::simulator::ExecutionModel;
use crate::store::{TaskStore, VaultStore};
use crate::tasks::model::TaskStatus;

/// Background processor for queued compute tasks.
pub struct TaskProcessor {
    pub(crate) deps: ExecutorDeps,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskProcessor {
    /// Create a processor over the given stores and execution model.
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        vault: Arc<dyn VaultStore>,
        model: Arc<dyn ExecutionModel>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            deps: ExecutorDeps {
                tasks,
                vault,
                model,
                config,
            },
            handle: Mutex::new(None),
        }
    }

    /// Run crash recovery, then begin the periodic discovery loop.
    ///
    /// The first tick fires immediately. Calling `start()` while the loop
    /// is already running is a no-op.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("Task processor already running");
            return;
        }

        let recovered = recover_stranded_tasks(&self.deps.tasks).await;
        if recovered > 0 {
            info!(recovered, "Stranded tasks requeued for the next tick");
        }

        let deps = self.deps.clone();
        let period = self.deps.config.tick_interval();
        *handle = Some(tokio::spawn(async move {
            info!(period_ms = period.as_millis() as u64, "Task processor started");

            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tick.tick().await;
                run_tick(&deps).await;
            }
        }));
    }

    /// Cancel the periodic loop.
    ///
    /// Executors already in flight are detached tasks and are left to
    /// finish on their own; anything interrupted mid-execution is caught by
    /// recovery on the next start.
    pub async fn stop(&self) {
        let mut handle = self.handle.lock().await;
        if let Some(handle) = handle.take() {
            handle.abort();
            info!("Task processor stopped");
        }
    }

    /// Whether the periodic loop is currently running.
    pub async fn is_active(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// The processor's configuration.
    pub fn config(&self) -> &ProcessorConfig {
        &self.deps.config
    }
}

/// One tick: discover queued tasks and execute them all in parallel.
///
/// A discovery failure is logged and the tick skipped; the loop keeps
/// running. Per-task errors are contained inside each spawned executor.
async fn run_tick(deps: &ExecutorDeps) {
    let queued = match deps.tasks.list_by_status(TaskStatus::Queued).await {
        Ok(queued) => queued,
        Err(e) => {
            warn!(error = %e, "Tick discovery failed, retrying next tick");
            return;
        }
    };

    if queued.is_empty() {
        debug!("No queued tasks this tick");
        return;
    }

    info!(count = queued.len(), "Processing queued tasks in parallel");

    let handles: Vec<_> = queued
        .into_iter()
        .map(|task| {
            let deps = deps.clone();
            tokio::spawn(async move {
                if let Err(e) = execute_one(&deps, &task).await {
                    warn!(task_id = %task.id, error = %e, "Task execution errored");
                }
            })
        })
        .collect();

    for joined in join_all(handles).await {
        if let Err(e) = joined {
            warn!(error = %e, "Executor task panicked");
        }
    }
}
