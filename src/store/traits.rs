//! Store traits — async interfaces over the task record and vault stores.
//!
//! The processor treats both as external collaborators: durable stores it
//! reads and writes but does not own. `LibSqlStore` implements both; tests
//! run against its in-memory variant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::StoreError;
use crate::tasks::model::{ComputeTask, ExecutionLogEntry, TaskStatus};
use crate::vault::VaultAggregate;

/// Durable storage for task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task.
    async fn insert_task(&self, task: &ComputeTask) -> Result<(), StoreError>;

    /// Fetch a task by ID.
    async fn get_task(&self, id: Uuid) -> Result<Option<ComputeTask>, StoreError>;

    /// List all tasks with the given status, oldest first.
    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<ComputeTask>, StoreError>;

    /// Count tasks with the given status.
    async fn count_by_status(&self, status: TaskStatus) -> Result<u64, StoreError>;

    /// Atomically claim a queued task for execution: `Queued → Running`,
    /// stamp `started_at`, increment `execution_attempts`.
    ///
    /// Returns `false` when the task was no longer queued (already claimed,
    /// cancelled, or unknown) — the caller must not proceed.
    async fn claim_for_execution(
        &self,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Mark a running task completed, recording the realized duration and
    /// success payload. Returns `false` if the task was not `Running`.
    async fn complete_task(
        &self,
        id: Uuid,
        finished_at: DateTime<Utc>,
        actual_duration: u64,
        result: &serde_json::Value,
    ) -> Result<bool, StoreError>;

    /// Mark a running task failed, recording the failure reason and error
    /// payload. Returns `false` if the task was not `Running`.
    async fn fail_task(
        &self,
        id: Uuid,
        finished_at: DateTime<Utc>,
        actual_duration: u64,
        error_message: &str,
        result: &serde_json::Value,
    ) -> Result<bool, StoreError>;

    /// Recovery reset: `Running → Queued`, clear `started_at`, increment
    /// `execution_attempts`. Returns `false` if the task was not `Running`.
    async fn reset_to_queued(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Atomically cancel a task still in `Queued`. Returns `false` when the
    /// task was not queued (claimed, terminal, or unknown).
    async fn cancel_if_queued(
        &self,
        id: Uuid,
        finished_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Append an entry to a task's execution log.
    async fn append_log(&self, task_id: Uuid, entry: &ExecutionLogEntry) -> Result<(), StoreError>;

    /// Fetch a task's execution log in append order.
    async fn get_log(&self, task_id: Uuid) -> Result<Vec<ExecutionLogEntry>, StoreError>;
}

/// Durable storage for the singleton vault aggregate.
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Load the vault record, creating a zeroed one if absent.
    async fn load_or_create(&self) -> Result<VaultAggregate, StoreError>;

    /// Apply a task completion: increment `total_tasks_executed` and add
    /// `reward` to the pool, as one serialized read-modify-write.
    async fn apply_completion(&self, reward: Decimal) -> Result<VaultAggregate, StoreError>;
}
