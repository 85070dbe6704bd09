//! Task executor — drives one task through its state machine.
//!
//! `queued → running → completed` or `queued → running → failed`. The claim
//! is an atomic check-and-set in the store, so a task claimed here can never
//! be re-claimed by a later tick. The simulated delay between claim and
//! resolve is the subsystem's only suspension point.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::processor::simulator::{ExecutionModel, Outcome};
use crate::store::{TaskStore, VaultStore};
use crate::tasks::model::{
    ComputeTask, ExecutionLogEntry, LogEvent, failure_payload, success_payload,
};
use crate::vault::reward_for;

/// Shared dependencies handed to each spawned executor.
#[derive(Clone)]
pub(crate) struct ExecutorDeps {
    pub tasks: Arc<dyn TaskStore>,
    pub vault: Arc<dyn VaultStore>,
    pub model: Arc<dyn ExecutionModel>,
    pub config: ProcessorConfig,
}

/// Execute one discovered task: claim, simulate, resolve.
///
/// Errors propagate to the tick, which logs them without aborting sibling
/// executors; a task that errors after the claim stays `running` and is
/// picked up by recovery on the next process start.
pub(crate) async fn execute_one(deps: &ExecutorDeps, task: &ComputeTask) -> Result<()> {
    let started_at = Utc::now();
    if !deps.tasks.claim_for_execution(task.id, started_at).await? {
        debug!(task_id = %task.id, "Task no longer queued, skipping");
        return Ok(());
    }
    let attempt = task.execution_attempts + 1;

    deps.tasks
        .append_log(
            task.id,
            &ExecutionLogEntry::new(
                LogEvent::Started,
                serde_json::json!({
                    "execution_attempt": attempt,
                    "estimated_duration": task.estimated_duration,
                }),
            ),
        )
        .await?;

    info!(
        task_id = %task.id,
        name = %task.name,
        cost = %task.cost_credits,
        attempt,
        "Task started"
    );

    let duration = deps.model.draw_duration(task.estimated_duration);
    tokio::time::sleep(deps.config.scaled(duration)).await;

    let finished_at = Utc::now();
    match deps.model.draw_outcome() {
        Outcome::Success => {
            let payload = success_payload(duration, finished_at, task.cost_credits);
            if !deps
                .tasks
                .complete_task(task.id, finished_at, duration, &payload)
                .await?
            {
                warn!(task_id = %task.id, "Task not running at resolve time, skipping");
                return Ok(());
            }
            deps.tasks
                .append_log(
                    task.id,
                    &ExecutionLogEntry::new(
                        LogEvent::Completed,
                        serde_json::json!({ "duration": duration }),
                    ),
                )
                .await?;

            // The single vault mutation for this task: executed count and
            // reward move together, exactly once.
            let reward = reward_for(task.cost_credits, deps.config.reward_rate);
            let vault = deps.vault.apply_completion(reward).await?;

            info!(
                task_id = %task.id,
                duration,
                reward = %reward,
                reward_pool = %vault.reward_pool,
                total_tasks_executed = vault.total_tasks_executed,
                "Task completed"
            );
        }
        Outcome::Failure(reason) => {
            let payload = failure_payload(reason, finished_at, duration);
            if !deps
                .tasks
                .fail_task(task.id, finished_at, duration, reason, &payload)
                .await?
            {
                warn!(task_id = %task.id, "Task not running at resolve time, skipping");
                return Ok(());
            }
            deps.tasks
                .append_log(
                    task.id,
                    &ExecutionLogEntry::new(
                        LogEvent::Failed,
                        serde_json::json!({ "duration": duration, "reason": reason }),
                    ),
                )
                .await?;

            info!(task_id = %task.id, duration, reason, "Task failed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::store::LibSqlStore;
    use crate::tasks::model::TaskStatus;

    /// Deterministic model: fixed duration, scripted outcome.
    struct ScriptedModel {
        duration: u64,
        outcome: Outcome,
    }

    impl ExecutionModel for ScriptedModel {
        fn draw_duration(&self, _estimated: Option<u64>) -> u64 {
            self.duration
        }
        fn draw_outcome(&self) -> Outcome {
            self.outcome
        }
    }

    async fn deps(outcome: Outcome) -> ExecutorDeps {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        ExecutorDeps {
            tasks: store.clone(),
            vault: store,
            model: Arc::new(ScriptedModel {
                duration: 2,
                outcome,
            }),
            config: ProcessorConfig {
                time_unit: Duration::from_millis(1),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn success_path_updates_vault_exactly_once() {
        let deps = deps(Outcome::Success).await;
        let task = ComputeTask::new("u", "t", dec!(100));
        deps.tasks.insert_task(&task).await.unwrap();

        execute_one(&deps, &task).await.unwrap();

        let done = deps.tasks.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.actual_duration, Some(2));
        assert_eq!(done.execution_attempts, 1);
        assert!(done.finished_at.is_some());
        assert_eq!(done.result.unwrap()["execution_time"], 2);

        let log = deps.tasks.get_log(task.id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].event, LogEvent::Started);
        assert_eq!(log[1].event, LogEvent::Completed);

        let vault = deps.vault.load_or_create().await.unwrap();
        assert_eq!(vault.total_tasks_executed, 1);
        assert_eq!(vault.reward_pool, dec!(5.00));
    }

    #[tokio::test]
    async fn failure_path_leaves_vault_untouched() {
        let deps = deps(Outcome::Failure("Simulated computation error")).await;
        let task = ComputeTask::new("u", "t", dec!(100));
        deps.tasks.insert_task(&task).await.unwrap();

        execute_one(&deps, &task).await.unwrap();

        let failed = deps.tasks.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("Simulated computation error")
        );
        assert_eq!(failed.result.unwrap()["error"], "Simulated computation error");

        let log = deps.tasks.get_log(task.id).await.unwrap();
        assert_eq!(log.last().unwrap().event, LogEvent::Failed);

        let vault = deps.vault.load_or_create().await.unwrap();
        assert_eq!(vault.total_tasks_executed, 0);
        assert_eq!(vault.reward_pool, dec!(0));
    }

    #[tokio::test]
    async fn lost_claim_is_a_silent_skip() {
        let deps = deps(Outcome::Success).await;
        let task = ComputeTask::new("u", "t", dec!(10));
        deps.tasks.insert_task(&task).await.unwrap();

        // Someone else already claimed it.
        deps.tasks
            .claim_for_execution(task.id, Utc::now())
            .await
            .unwrap();

        execute_one(&deps, &task).await.unwrap();

        let unchanged = deps.tasks.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, TaskStatus::Running);
        assert!(deps.tasks.get_log(task.id).await.unwrap().is_empty());
        assert_eq!(
            deps.vault.load_or_create().await.unwrap().total_tasks_executed,
            0
        );
    }
}
