//! Processor observability — status, queue, and history views consumed by
//! the API layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, TaskError};
use crate::processor::scheduler::TaskProcessor;
use crate::tasks::model::{ComputeTask, ExecutionLogEntry, TaskStatus};

/// Per-status task counts.
#[derive(Debug, Clone, Serialize)]
pub struct TaskCounts {
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub total: u64,
}

/// The processor's effective configuration, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorConfigView {
    pub tick_units: u64,
    pub time_unit_ms: u64,
    pub min_duration: u64,
    pub max_duration: u64,
    pub success_rate: u8,
    pub reward_rate: Decimal,
}

/// Status/statistics snapshot of the processor.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorStats {
    pub active: bool,
    pub task_counts: TaskCounts,
    pub config: ProcessorConfigView,
}

/// One queued task as seen in the detailed queue view.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedTaskView {
    /// 1-based dispatch position (oldest first).
    pub position: usize,
    pub task_id: Uuid,
    pub name: String,
    pub owner_id: String,
    pub cost_credits: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    /// Wall-clock seconds since the task was created.
    pub seconds_in_queue: i64,
}

/// Detailed view of the current queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub tasks: Vec<QueuedTaskView>,
    pub total_queued: usize,
    /// Sum of declared estimates (default-range midpoint for tasks without
    /// one), in time units.
    pub estimated_processing_units: u64,
}

/// Full execution history of one task: summary, event log, terminal result.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionHistory {
    pub task: ComputeTask,
    pub execution_log: Vec<ExecutionLogEntry>,
}

impl TaskProcessor {
    /// Status and statistics for the processor.
    pub async fn stats(&self) -> Result<ProcessorStats> {
        let tasks = &self.deps.tasks;
        let queued = tasks.count_by_status(TaskStatus::Queued).await?;
        let running = tasks.count_by_status(TaskStatus::Running).await?;
        let completed = tasks.count_by_status(TaskStatus::Completed).await?;
        let failed = tasks.count_by_status(TaskStatus::Failed).await?;
        let cancelled = tasks.count_by_status(TaskStatus::Cancelled).await?;

        let config = &self.deps.config;
        Ok(ProcessorStats {
            active: self.is_active().await,
            task_counts: TaskCounts {
                queued,
                running,
                completed,
                failed,
                cancelled,
                total: queued + running + completed + failed + cancelled,
            },
            config: ProcessorConfigView {
                tick_units: config.tick_units,
                time_unit_ms: config.time_unit.as_millis() as u64,
                min_duration: config.min_duration,
                max_duration: config.max_duration,
                success_rate: config.success_rate,
                reward_rate: config.reward_rate,
            },
        })
    }

    /// Detailed queue view, oldest first with dispatch positions.
    pub async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        let queued = self.deps.tasks.list_by_status(TaskStatus::Queued).await?;
        let now = Utc::now();
        let fallback = (self.deps.config.min_duration + self.deps.config.max_duration) / 2;

        let estimated_processing_units = queued
            .iter()
            .map(|t| t.estimated_duration.unwrap_or(fallback))
            .sum();

        let tasks: Vec<QueuedTaskView> = queued
            .into_iter()
            .enumerate()
            .map(|(i, task)| QueuedTaskView {
                position: i + 1,
                task_id: task.id,
                name: task.name,
                owner_id: task.owner_id,
                cost_credits: task.cost_credits,
                estimated_duration: task.estimated_duration,
                priority: task.priority,
                created_at: task.created_at,
                seconds_in_queue: (now - task.created_at).num_seconds().max(0),
            })
            .collect();

        Ok(QueueSnapshot {
            total_queued: tasks.len(),
            estimated_processing_units,
            tasks,
        })
    }

    /// Full execution history of one task.
    pub async fn execution_history(&self, id: Uuid) -> Result<ExecutionHistory> {
        let task = self
            .deps
            .tasks
            .get_task(id)
            .await?
            .ok_or(TaskError::NotFound { id })?;
        let execution_log = self.deps.tasks.get_log(id).await?;
        Ok(ExecutionHistory {
            task,
            execution_log,
        })
    }
}
