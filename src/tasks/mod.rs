//! Compute task domain — entity model, execution log, owner operations.

pub mod model;

pub use model::{ComputeTask, ExecutionLogEntry, LogEvent, TaskStatus};

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, TaskError};
use crate::store::TaskStore;

/// Cancel a task that is still queued.
///
/// The check-and-set happens in the store, so a task claimed into `running`
/// between the caller's read and this call is correctly refused. Running
/// and terminal tasks yield [`TaskError::NotCancellable`] and are left
/// unchanged.
pub async fn cancel(store: &Arc<dyn TaskStore>, id: Uuid) -> Result<ComputeTask> {
    if store.cancel_if_queued(id, Utc::now()).await? {
        store
            .append_log(
                id,
                &ExecutionLogEntry::new(
                    LogEvent::Cancelled,
                    serde_json::json!({ "reason": "Cancelled by owner" }),
                ),
            )
            .await?;
        let task = store
            .get_task(id)
            .await?
            .ok_or(TaskError::NotFound { id })?;
        info!(task_id = %id, "Task cancelled");
        Ok(task)
    } else {
        match store.get_task(id).await? {
            Some(task) => Err(TaskError::NotCancellable {
                id,
                status: task.status,
            }
            .into()),
            None => Err(TaskError::NotFound { id }.into()),
        }
    }
}
