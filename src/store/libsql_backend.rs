//! libSQL store — async `TaskStore` + `VaultStore` implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync` and safe
//! for concurrent async use. Vault updates additionally serialize behind an
//! async mutex so concurrent completions never lose an increment.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::{TaskStore, VaultStore};
use crate::tasks::model::{ComputeTask, ExecutionLogEntry, LogEvent, TaskStatus};
use crate::vault::VaultAggregate;

/// libSQL-backed task and vault store.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    /// Single-writer serialization point for vault read-modify-writes.
    vault_lock: Mutex<()>,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");

        Ok(Self {
            db: Arc::new(db),
            conn,
            vault_lock: Mutex::new(()),
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
            vault_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Read the vault row without taking the lock; callers hold it.
    async fn read_or_seed_vault(&self) -> Result<VaultAggregate, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT total_locked_stake, total_credits_issued, total_tasks_executed, reward_pool, updated_at
                 FROM compute_vault WHERE id = 1",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read vault: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read vault row: {e}")))?;

        if let Some(row) = row {
            return row_to_vault(&row)
                .map_err(|e| StoreError::Query(format!("Failed to map vault row: {e}")));
        }

        // First access: seed the singleton.
        let vault = VaultAggregate::default();
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO compute_vault
                 (id, total_locked_stake, total_credits_issued, total_tasks_executed, reward_pool, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5)",
                params![
                    vault.total_locked_stake.to_string(),
                    vault.total_credits_issued.to_string(),
                    vault.total_tasks_executed as i64,
                    vault.reward_pool.to_string(),
                    vault.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to seed vault: {e}")))?;
        info!("Vault aggregate created");
        Ok(vault)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_decimal(s: &str) -> Decimal {
    s.parse().unwrap_or_default()
}

/// Convert a TaskStatus to its DB string.
fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Queued => "queued",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Cancelled => "cancelled",
    }
}

/// Parse a status string from the DB.
fn str_to_status(s: &str) -> TaskStatus {
    match s {
        "running" => TaskStatus::Running,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        _ => TaskStatus::Queued,
    }
}

fn event_to_str(event: LogEvent) -> &'static str {
    match event {
        LogEvent::Started => "started",
        LogEvent::Completed => "completed",
        LogEvent::Failed => "failed",
        LogEvent::Recovered => "recovered",
        LogEvent::Cancelled => "cancelled",
    }
}

fn str_to_event(s: &str) -> LogEvent {
    match s {
        "completed" => LogEvent::Completed,
        "failed" => LogEvent::Failed,
        "recovered" => LogEvent::Recovered,
        "cancelled" => LogEvent::Cancelled,
        _ => LogEvent::Started,
    }
}

/// Convert `Option<String>` to a libsql Value.
fn opt_text(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn opt_int(v: Option<u64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Integer(v as i64),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a ComputeTask.
///
/// Column order matches TASK_COLUMNS:
/// 0:id, 1:owner_id, 2:name, 3:cost_credits, 4:estimated_duration,
/// 5:priority, 6:status, 7:started_at, 8:finished_at, 9:actual_duration,
/// 10:execution_attempts, 11:error_message, 12:result, 13:created_at,
/// 14:updated_at
fn row_to_task(row: &libsql::Row) -> Result<ComputeTask, libsql::Error> {
    let id_str: String = row.get(0)?;
    let cost_str: String = row.get(3)?;
    let status_str: String = row.get(6)?;
    let started_str: Option<String> = row.get(7).ok();
    let finished_str: Option<String> = row.get(8).ok();
    let result_str: Option<String> = row.get(12).ok();
    let created_str: String = row.get(13)?;
    let updated_str: String = row.get(14)?;

    Ok(ComputeTask {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        owner_id: row.get(1)?,
        name: row.get(2)?,
        cost_credits: parse_decimal(&cost_str),
        estimated_duration: row.get::<i64>(4).ok().map(|v| v as u64),
        priority: row.get::<i64>(5)? as i32,
        status: str_to_status(&status_str),
        started_at: parse_optional_datetime(&started_str),
        finished_at: parse_optional_datetime(&finished_str),
        actual_duration: row.get::<i64>(9).ok().map(|v| v as u64),
        execution_attempts: row.get::<i64>(10)? as u32,
        error_message: row.get(11).ok(),
        result: result_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_vault(row: &libsql::Row) -> Result<VaultAggregate, libsql::Error> {
    let locked_str: String = row.get(0)?;
    let issued_str: String = row.get(1)?;
    let executed: i64 = row.get(2)?;
    let pool_str: String = row.get(3)?;
    let updated_str: String = row.get(4)?;

    Ok(VaultAggregate {
        total_locked_stake: parse_decimal(&locked_str),
        total_credits_issued: parse_decimal(&issued_str),
        total_tasks_executed: executed as u64,
        reward_pool: parse_decimal(&pool_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementations ───────────────────────────────────────────

const TASK_COLUMNS: &str = "id, owner_id, name, cost_credits, estimated_duration, priority, status, started_at, finished_at, actual_duration, execution_attempts, error_message, result, created_at, updated_at";

#[async_trait]
impl TaskStore for LibSqlStore {
    async fn insert_task(&self, task: &ComputeTask) -> Result<(), StoreError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO compute_tasks ({TASK_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    task.id.to_string(),
                    task.owner_id.clone(),
                    task.name.clone(),
                    task.cost_credits.to_string(),
                    opt_int(task.estimated_duration),
                    task.priority as i64,
                    status_to_str(task.status),
                    opt_text(task.started_at.map(|t| t.to_rfc3339())),
                    opt_text(task.finished_at.map(|t| t.to_rfc3339())),
                    opt_int(task.actual_duration),
                    task.execution_attempts as i64,
                    opt_text(task.error_message.clone()),
                    opt_text(task.result.as_ref().map(|v| v.to_string())),
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to insert task: {e}")))?;
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<ComputeTask>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM compute_tasks WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query task: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read task row: {e}")))?;

        match row {
            Some(row) => {
                let task = row_to_task(&row)
                    .map_err(|e| StoreError::Query(format!("Failed to map task row: {e}")))?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<ComputeTask>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM compute_tasks
                     WHERE status = ?1 ORDER BY created_at ASC"
                ),
                params![status_to_str(status)],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to list tasks: {e}")))?;

        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read task row: {e}")))?
        {
            let task = row_to_task(&row)
                .map_err(|e| StoreError::Query(format!("Failed to map task row: {e}")))?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    async fn count_by_status(&self, status: TaskStatus) -> Result<u64, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM compute_tasks WHERE status = ?1",
                params![status_to_str(status)],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count tasks: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read count: {e}")))?;

        match row {
            Some(row) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("Failed to parse count: {e}")))?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }

    async fn claim_for_execution(
        &self,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE compute_tasks
                 SET status = 'running',
                     started_at = ?1,
                     execution_attempts = execution_attempts + 1,
                     updated_at = ?1
                 WHERE id = ?2 AND status = 'queued'",
                params![started_at.to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to claim task: {e}")))?;
        Ok(affected == 1)
    }

    async fn complete_task(
        &self,
        id: Uuid,
        finished_at: DateTime<Utc>,
        actual_duration: u64,
        result: &serde_json::Value,
    ) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE compute_tasks
                 SET status = 'completed',
                     finished_at = ?1,
                     actual_duration = ?2,
                     result = ?3,
                     updated_at = ?1
                 WHERE id = ?4 AND status = 'running'",
                params![
                    finished_at.to_rfc3339(),
                    actual_duration as i64,
                    result.to_string(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to complete task: {e}")))?;
        Ok(affected == 1)
    }

    async fn fail_task(
        &self,
        id: Uuid,
        finished_at: DateTime<Utc>,
        actual_duration: u64,
        error_message: &str,
        result: &serde_json::Value,
    ) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE compute_tasks
                 SET status = 'failed',
                     finished_at = ?1,
                     actual_duration = ?2,
                     error_message = ?3,
                     result = ?4,
                     updated_at = ?1
                 WHERE id = ?5 AND status = 'running'",
                params![
                    finished_at.to_rfc3339(),
                    actual_duration as i64,
                    error_message,
                    result.to_string(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to fail task: {e}")))?;
        Ok(affected == 1)
    }

    async fn reset_to_queued(&self, id: Uuid) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE compute_tasks
                 SET status = 'queued',
                     started_at = NULL,
                     execution_attempts = execution_attempts + 1,
                     updated_at = ?1
                 WHERE id = ?2 AND status = 'running'",
                params![Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to reset task: {e}")))?;
        Ok(affected == 1)
    }

    async fn cancel_if_queued(
        &self,
        id: Uuid,
        finished_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE compute_tasks
                 SET status = 'cancelled',
                     finished_at = ?1,
                     updated_at = ?1
                 WHERE id = ?2 AND status = 'queued'",
                params![finished_at.to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to cancel task: {e}")))?;
        Ok(affected == 1)
    }

    async fn append_log(&self, task_id: Uuid, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        let details = serde_json::to_string(&entry.details)
            .map_err(|e| StoreError::Serialization(format!("Failed to encode log details: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO task_execution_log (task_id, timestamp, event, details)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    task_id.to_string(),
                    entry.timestamp.to_rfc3339(),
                    event_to_str(entry.event),
                    details,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to append log entry: {e}")))?;
        Ok(())
    }

    async fn get_log(&self, task_id: Uuid) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT timestamp, event, details FROM task_execution_log
                 WHERE task_id = ?1 ORDER BY id ASC",
                params![task_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query log: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read log row: {e}")))?
        {
            let ts_str: String = row
                .get(0)
                .map_err(|e| StoreError::Query(format!("Failed to map log row: {e}")))?;
            let event_str: String = row
                .get(1)
                .map_err(|e| StoreError::Query(format!("Failed to map log row: {e}")))?;
            let details_str: String = row
                .get(2)
                .map_err(|e| StoreError::Query(format!("Failed to map log row: {e}")))?;

            entries.push(ExecutionLogEntry {
                timestamp: parse_datetime(&ts_str),
                event: str_to_event(&event_str),
                details: serde_json::from_str(&details_str)
                    .unwrap_or(serde_json::Value::Null),
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl VaultStore for LibSqlStore {
    async fn load_or_create(&self) -> Result<VaultAggregate, StoreError> {
        let _guard = self.vault_lock.lock().await;
        self.read_or_seed_vault().await
    }

    async fn apply_completion(&self, reward: Decimal) -> Result<VaultAggregate, StoreError> {
        let _guard = self.vault_lock.lock().await;

        let mut vault = self.read_or_seed_vault().await?;
        vault.total_tasks_executed += 1;
        vault.reward_pool += reward;
        vault.updated_at = Utc::now();

        self.conn()
            .execute(
                "UPDATE compute_vault
                 SET total_tasks_executed = ?1, reward_pool = ?2, updated_at = ?3
                 WHERE id = 1",
                params![
                    vault.total_tasks_executed as i64,
                    vault.reward_pool.to_string(),
                    vault.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to update vault: {e}")))?;

        Ok(vault)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    async fn store() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = store().await;
        let task = ComputeTask::new("creator-1", "render frames", dec!(25.50))
            .with_estimated_duration(10)
            .with_priority(3);
        store.insert_task(&task).await.unwrap();

        let loaded = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, task.id);
        assert_eq!(loaded.owner_id, "creator-1");
        assert_eq!(loaded.name, "render frames");
        assert_eq!(loaded.cost_credits, dec!(25.50));
        assert_eq!(loaded.estimated_duration, Some(10));
        assert_eq!(loaded.priority, 3);
        assert_eq!(loaded.status, TaskStatus::Queued);
        assert_eq!(loaded.execution_attempts, 0);
    }

    #[tokio::test]
    async fn get_unknown_task_is_none() {
        let store = store().await;
        assert!(store.get_task(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_status_orders_oldest_first() {
        let store = store().await;
        let now = Utc::now();

        let mut newer = ComputeTask::new("u", "newer", dec!(1));
        newer.created_at = now;
        let mut older = ComputeTask::new("u", "older", dec!(1));
        older.created_at = now - chrono::Duration::seconds(60);

        store.insert_task(&newer).await.unwrap();
        store.insert_task(&older).await.unwrap();

        let queued = store.list_by_status(TaskStatus::Queued).await.unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].name, "older");
        assert_eq!(queued[1].name, "newer");
    }

    #[tokio::test]
    async fn claim_has_exactly_one_winner() {
        let store = store().await;
        let task = ComputeTask::new("u", "t", dec!(5));
        store.insert_task(&task).await.unwrap();

        let now = Utc::now();
        assert!(store.claim_for_execution(task.id, now).await.unwrap());
        assert!(!store.claim_for_execution(task.id, now).await.unwrap());

        let claimed = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::Running);
        assert_eq!(claimed.execution_attempts, 1);
        assert!(claimed.started_at.is_some());
    }

    #[tokio::test]
    async fn complete_requires_running() {
        let store = store().await;
        let task = ComputeTask::new("u", "t", dec!(5));
        store.insert_task(&task).await.unwrap();

        // Still queued — guard rejects the write.
        let ok = store
            .complete_task(task.id, Utc::now(), 4, &serde_json::json!({}))
            .await
            .unwrap();
        assert!(!ok);
        let unchanged = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, TaskStatus::Queued);

        store.claim_for_execution(task.id, Utc::now()).await.unwrap();
        let ok = store
            .complete_task(task.id, Utc::now(), 4, &serde_json::json!({"execution_time": 4}))
            .await
            .unwrap();
        assert!(ok);

        let done = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.actual_duration, Some(4));
        assert!(done.finished_at.is_some());
        assert_eq!(done.result.unwrap()["execution_time"], 4);
    }

    #[tokio::test]
    async fn fail_records_reason() {
        let store = store().await;
        let task = ComputeTask::new("u", "t", dec!(5));
        store.insert_task(&task).await.unwrap();
        store.claim_for_execution(task.id, Utc::now()).await.unwrap();

        let ok = store
            .fail_task(
                task.id,
                Utc::now(),
                3,
                "Simulated network timeout",
                &serde_json::json!({"error": "Simulated network timeout"}),
            )
            .await
            .unwrap();
        assert!(ok);

        let failed = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("Simulated network timeout"));
        assert_eq!(failed.actual_duration, Some(3));
    }

    #[tokio::test]
    async fn reset_to_queued_clears_start_and_bumps_attempts() {
        let store = store().await;
        let task = ComputeTask::new("u", "t", dec!(5));
        store.insert_task(&task).await.unwrap();
        store.claim_for_execution(task.id, Utc::now()).await.unwrap();

        assert!(store.reset_to_queued(task.id).await.unwrap());

        let reset = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(reset.status, TaskStatus::Queued);
        assert!(reset.started_at.is_none());
        assert_eq!(reset.execution_attempts, 2);

        // Not running any more — second reset is a no-op.
        assert!(!store.reset_to_queued(task.id).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_only_applies_to_queued() {
        let store = store().await;
        let task = ComputeTask::new("u", "t", dec!(5));
        store.insert_task(&task).await.unwrap();

        assert!(store.cancel_if_queued(task.id, Utc::now()).await.unwrap());
        let cancelled = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);

        let running = ComputeTask::new("u", "t2", dec!(5));
        store.insert_task(&running).await.unwrap();
        store
            .claim_for_execution(running.id, Utc::now())
            .await
            .unwrap();
        assert!(!store.cancel_if_queued(running.id, Utc::now()).await.unwrap());
        let unchanged = store.get_task(running.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn log_entries_come_back_in_append_order() {
        let store = store().await;
        let task = ComputeTask::new("u", "t", dec!(5));
        store.insert_task(&task).await.unwrap();

        for event in [LogEvent::Started, LogEvent::Recovered, LogEvent::Started] {
            store
                .append_log(task.id, &ExecutionLogEntry::new(event, serde_json::json!({})))
                .await
                .unwrap();
        }

        let log = store.get_log(task.id).await.unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].event, LogEvent::Started);
        assert_eq!(log[1].event, LogEvent::Recovered);
        assert_eq!(log[2].event, LogEvent::Started);
    }

    #[tokio::test]
    async fn count_by_status() {
        let store = store().await;
        for _ in 0..3 {
            store
                .insert_task(&ComputeTask::new("u", "t", dec!(1)))
                .await
                .unwrap();
        }
        assert_eq!(store.count_by_status(TaskStatus::Queued).await.unwrap(), 3);
        assert_eq!(store.count_by_status(TaskStatus::Running).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn vault_created_lazily_and_zeroed() {
        let store = store().await;
        let vault = store.load_or_create().await.unwrap();
        assert_eq!(vault.total_tasks_executed, 0);
        assert_eq!(vault.reward_pool, Decimal::ZERO);

        // Second load returns the same singleton.
        let again = store.load_or_create().await.unwrap();
        assert_eq!(again.total_tasks_executed, 0);
    }

    #[tokio::test]
    async fn apply_completion_accumulates() {
        let store = store().await;
        store.apply_completion(dec!(5)).await.unwrap();
        let vault = store.apply_completion(dec!(1.50)).await.unwrap();
        assert_eq!(vault.total_tasks_executed, 2);
        assert_eq!(vault.reward_pool, dec!(6.50));
    }

    #[tokio::test]
    async fn concurrent_completions_lose_no_updates() {
        let store = Arc::new(store().await);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.apply_completion(dec!(1)).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let vault = store.load_or_create().await.unwrap();
        assert_eq!(vault.total_tasks_executed, 10);
        assert_eq!(vault.reward_pool, dec!(10));
    }

    #[tokio::test]
    async fn local_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");

        let task = ComputeTask::new("u", "persisted", dec!(7));
        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.insert_task(&task).await.unwrap();
        }

        let reopened = LibSqlStore::new_local(&path).await.unwrap();
        let loaded = reopened.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "persisted");
        assert_eq!(loaded.cost_credits, dec!(7));
    }
}
