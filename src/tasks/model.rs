//! Compute task data model — entity, status state machine, execution log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a compute task.
///
/// Transitions are forward-only: `Queued → Running → {Completed|Failed}`,
/// with `Queued → Cancelled` as the only externally triggered edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up by the scheduler.
    Queued,
    /// Claimed by an executor; simulated work in flight.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
    /// Cancelled by its owner while still queued.
    Cancelled,
}

impl TaskStatus {
    /// Check whether this status may legally transition to `target`.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Queued, Running) | (Queued, Cancelled) | (Running, Completed) | (Running, Failed)
        )
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// All statuses, for per-status counting.
    pub fn all() -> [TaskStatus; 5] {
        [
            Self::Queued,
            Self::Running,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Kind of entry in a task's execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    Started,
    Completed,
    Failed,
    Recovered,
    Cancelled,
}

impl std::fmt::Display for LogEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Recovered => "recovered",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One append-only entry in a task's execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub event: LogEvent,
    /// Structured detail payload.
    pub details: serde_json::Value,
}

impl ExecutionLogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(event: LogEvent, details: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
            details,
        }
    }
}

/// One unit of submitted compute work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeTask {
    /// Unique ID.
    pub id: Uuid,
    /// Owner of this task.
    pub owner_id: String,
    /// Short descriptive name.
    pub name: String,
    /// Declared cost in compute credits.
    pub cost_credits: Decimal,
    /// Declared duration estimate, in time units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,
    /// Dispatch ordering hint (lower = higher priority); informational only,
    /// dispatch order is creation time.
    pub priority: i32,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// When the current execution attempt started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Realized execution duration, in time units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<u64>,
    /// Times this task has entered `Running` (recovery resets count too).
    pub execution_attempts: u32,
    /// Failure reason, when the task failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Terminal outcome payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ComputeTask {
    /// Create a new queued task.
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, cost_credits: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: name.into(),
            cost_credits,
            estimated_duration: None,
            priority: 0,
            status: TaskStatus::Queued,
            started_at: None,
            finished_at: None,
            actual_duration: None,
            execution_attempts: 0,
            error_message: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: declare a duration estimate, in time units.
    pub fn with_estimated_duration(mut self, units: u64) -> Self {
        self.estimated_duration = Some(units);
        self
    }

    /// Builder: set the priority hint.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Build the success payload recorded on a completed task.
pub fn success_payload(
    execution_time: u64,
    completed_at: DateTime<Utc>,
    cost_credits: Decimal,
) -> serde_json::Value {
    serde_json::json!({
        "outcome": "Task executed successfully",
        "execution_time": execution_time,
        "completed_at": completed_at,
        "cost_credits": cost_credits,
    })
}

/// Build the error payload recorded on a failed task.
pub fn failure_payload(
    reason: &str,
    failed_at: DateTime<Utc>,
    attempted_duration: u64,
) -> serde_json::Value {
    serde_json::json!({
        "error": reason,
        "failed_at": failed_at,
        "attempted_duration": attempted_duration,
    })
}
