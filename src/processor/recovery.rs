//! Crash recovery — reconcile tasks stranded in `running` by an unclean
//! shutdown.
//!
//! No task should observe `running` while no scheduler is alive, so any
//! found at startup were interrupted mid-execution. Each is reset to
//! `queued` (eligible for the next tick) with its attempt counter bumped
//! and a `recovered` entry appended to its log. The vault is never touched
//! here: a stranded task never reached a terminal state, so no reward was
//! issued.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::store::TaskStore;
use crate::tasks::model::{ExecutionLogEntry, LogEvent, TaskStatus};

/// Reset all stranded `running` tasks back to `queued`.
///
/// A failure on any one task is logged and skipped; partial recovery must
/// never fail startup. Returns the number of tasks recovered.
pub async fn recover_stranded_tasks(tasks: &Arc<dyn TaskStore>) -> u64 {
    let stranded = match tasks.list_by_status(TaskStatus::Running).await {
        Ok(stranded) => stranded,
        Err(e) => {
            warn!(error = %e, "Failed to scan for stranded tasks");
            return 0;
        }
    };

    if stranded.is_empty() {
        info!("No stranded tasks found");
        return 0;
    }

    info!(count = stranded.len(), "Resetting stranded tasks to queued");

    let mut recovered = 0;
    for task in stranded {
        match tasks.reset_to_queued(task.id).await {
            Ok(true) => {}
            Ok(false) => {
                // Raced with something else; nothing to recover.
                warn!(task_id = %task.id, "Stranded task no longer running, skipping");
                continue;
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Failed to reset stranded task");
                continue;
            }
        }

        let entry = ExecutionLogEntry::new(
            LogEvent::Recovered,
            serde_json::json!({
                "reason": "Process restarted while task was running",
                "recovery_time": Utc::now(),
            }),
        );
        if let Err(e) = tasks.append_log(task.id, &entry).await {
            warn!(task_id = %task.id, error = %e, "Failed to append recovery log entry");
        }

        info!(task_id = %task.id, name = %task.name, "Recovered stranded task");
        recovered += 1;
    }

    recovered
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::store::LibSqlStore;
    use crate::tasks::model::ComputeTask;

    #[tokio::test]
    async fn recovery_resets_running_tasks() {
        let store: Arc<dyn TaskStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());

        let stranded = ComputeTask::new("u", "stranded", dec!(5));
        let untouched = ComputeTask::new("u", "queued", dec!(5));
        store.insert_task(&stranded).await.unwrap();
        store.insert_task(&untouched).await.unwrap();
        store
            .claim_for_execution(stranded.id, Utc::now())
            .await
            .unwrap();

        let recovered = recover_stranded_tasks(&store).await;
        assert_eq!(recovered, 1);

        let task = store.get_task(stranded.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.started_at.is_none());
        // One claim + one recovery reset.
        assert_eq!(task.execution_attempts, 2);

        let log = store.get_log(stranded.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event, LogEvent::Recovered);
        assert!(log[0].details["reason"].is_string());

        // The queued task was left alone.
        let other = store.get_task(untouched.id).await.unwrap().unwrap();
        assert_eq!(other.execution_attempts, 0);
        assert!(store.get_log(untouched.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recovery_with_nothing_stranded_is_noop() {
        let store: Arc<dyn TaskStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        assert_eq!(recover_stranded_tasks(&store).await, 0);
    }
}
