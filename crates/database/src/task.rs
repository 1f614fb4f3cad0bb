//! Durable task queue.
//!
//! Tasks move through `pending -> running -> succeeded`, or back to `retrying`
//! with a delay when an attempt fails. A claim takes a time-bounded lease and
//! counts as an attempt; once `attempts == max_attempts` a failing task is moved
//! to `dead` instead of being retried. A `running` task whose lease expired
//! (crashed or hung worker) can be claimed again by any worker.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::error::{DatabaseError, Result};

/// Default attempts per task (one try plus three retries).
pub const DEFAULT_MAX_ATTEMPTS: i64 = 4;

const TASK_COLUMNS: &str = "id, kind, payload, state, attempts, max_attempts, scheduled_at, \
     lease_until, worker_id, last_error, result, correlation_id, created_at, updated_at";

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Dead,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Retrying => "retrying",
            TaskState::Succeeded => "succeeded",
            TaskState::Dead => "dead",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Dead)
    }
}

/// A queued unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: String,
    /// Job kind used by workers to pick a handler.
    pub kind: String,
    /// JSON-encoded job payload.
    pub payload: String,
    pub state: TaskState,
    /// Claims so far, including the current one.
    pub attempts: i64,
    pub max_attempts: i64,
    /// Earliest claim time (epoch ms).
    pub scheduled_at: i64,
    /// Lease expiry while running (epoch ms).
    pub lease_until: Option<i64>,
    pub worker_id: Option<String>,
    pub last_error: Option<String>,
    /// JSON-encoded job result, if the handler produced one.
    pub result: Option<String>,
    pub correlation_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Whether another attempt is allowed after the current one.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Decode the payload.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// A task to enqueue.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub kind: String,
    pub payload: serde_json::Value,
    pub max_attempts: i64,
    pub correlation_id: Option<String>,
}

impl NewTask {
    /// Serialize `payload` into a task of the given kind.
    pub fn new<T: Serialize>(kind: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self {
            kind: kind.into(),
            payload: serde_json::to_value(payload)?,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            correlation_id: None,
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: i64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn lease_lost(id: &str) -> DatabaseError {
    DatabaseError::NotFound {
        entity: "Running task",
        id: id.to_string(),
    }
}

/// Enqueue a task, ready immediately.
pub async fn enqueue<'e, E>(executor: E, task: &NewTask) -> Result<Task>
where
    E: SqliteExecutor<'e>,
{
    let now = millis(Utc::now());
    let id = Uuid::new_v4().to_string();

    let task = sqlx::query_as::<_, Task>(&format!(
        r#"
        INSERT INTO tasks (id, kind, payload, state, attempts, max_attempts,
                           scheduled_at, correlation_id, created_at, updated_at)
        VALUES (?, ?, ?, 'pending', 0, ?, ?, ?, ?, ?)
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(&id)
    .bind(&task.kind)
    .bind(task.payload.to_string())
    .bind(task.max_attempts)
    .bind(now)
    .bind(&task.correlation_id)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(task)
}

/// Atomically lease the next ready task for `worker_id`.
///
/// Ready means pending or retrying with `scheduled_at <= now`, or running with an
/// expired lease, and with attempts left. The claim increments `attempts`.
pub async fn claim_next(
    pool: &SqlitePool,
    worker_id: &str,
    now: DateTime<Utc>,
    lease: Duration,
) -> Result<Option<Task>> {
    let now_ms = millis(now);
    let lease_until = now_ms.saturating_add(duration_millis(lease));

    let task = sqlx::query_as::<_, Task>(&format!(
        r#"
        UPDATE tasks
        SET state = 'running',
            attempts = attempts + 1,
            worker_id = ?,
            lease_until = ?,
            updated_at = ?
        WHERE id = (
            SELECT id FROM tasks
            WHERE attempts < max_attempts
              AND (
                (state IN ('pending', 'retrying') AND scheduled_at <= ?)
                OR (state = 'running' AND lease_until <= ?)
              )
            ORDER BY scheduled_at, created_at
            LIMIT 1
        )
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(worker_id)
    .bind(lease_until)
    .bind(now_ms)
    .bind(now_ms)
    .bind(now_ms)
    .fetch_optional(pool)
    .await?;

    Ok(task)
}

/// Acknowledge a completed task. Fails if the lease was lost to another worker.
pub async fn mark_succeeded(
    pool: &SqlitePool,
    id: &str,
    worker_id: &str,
    result: Option<&serde_json::Value>,
) -> Result<()> {
    let outcome = sqlx::query(
        r#"
        UPDATE tasks
        SET state = 'succeeded', lease_until = NULL, result = ?, last_error = NULL, updated_at = ?
        WHERE id = ? AND state = 'running' AND worker_id = ?
        "#,
    )
    .bind(result.map(|r| r.to_string()))
    .bind(millis(Utc::now()))
    .bind(id)
    .bind(worker_id)
    .execute(pool)
    .await?;

    if outcome.rows_affected() == 0 {
        return Err(lease_lost(id));
    }
    Ok(())
}

/// Release a failed attempt for another try after `delay`.
pub async fn mark_retry(
    pool: &SqlitePool,
    id: &str,
    worker_id: &str,
    error: &str,
    delay: Duration,
) -> Result<()> {
    let now = millis(Utc::now());
    let outcome = sqlx::query(
        r#"
        UPDATE tasks
        SET state = 'retrying', scheduled_at = ?, lease_until = NULL, worker_id = NULL,
            last_error = ?, updated_at = ?
        WHERE id = ? AND state = 'running' AND worker_id = ?
        "#,
    )
    .bind(now.saturating_add(duration_millis(delay)))
    .bind(error)
    .bind(now)
    .bind(id)
    .bind(worker_id)
    .execute(pool)
    .await?;

    if outcome.rows_affected() == 0 {
        return Err(lease_lost(id));
    }
    Ok(())
}

/// Terminally fail a task.
pub async fn mark_dead(pool: &SqlitePool, id: &str, worker_id: &str, error: &str) -> Result<()> {
    let outcome = sqlx::query(
        r#"
        UPDATE tasks
        SET state = 'dead', lease_until = NULL, last_error = ?, updated_at = ?
        WHERE id = ? AND state = 'running' AND worker_id = ?
        "#,
    )
    .bind(error)
    .bind(millis(Utc::now()))
    .bind(id)
    .bind(worker_id)
    .execute(pool)
    .await?;

    if outcome.rows_affected() == 0 {
        return Err(lease_lost(id));
    }
    Ok(())
}

/// Dead-letter running tasks whose lease expired with no attempts left.
///
/// Returns the number of tasks moved to `dead`.
pub async fn reap_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let now_ms = millis(now);
    let outcome = sqlx::query(
        r#"
        UPDATE tasks
        SET state = 'dead', lease_until = NULL,
            last_error = COALESCE(last_error, 'lease expired'), updated_at = ?
        WHERE state = 'running' AND lease_until <= ? AND attempts >= max_attempts
        "#,
    )
    .bind(now_ms)
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected())
}

/// Get a task by ID.
pub async fn get_task(pool: &SqlitePool, id: &str) -> Result<Task> {
    sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Task",
            id: id.to_string(),
        })
}

/// List tasks of a kind, newest first.
pub async fn list_tasks_by_kind(pool: &SqlitePool, kind: &str, limit: i64) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE kind = ? ORDER BY created_at DESC, id LIMIT ?"
    ))
    .bind(kind)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(tasks)
}

/// Count tasks in a state.
pub async fn count_by_state(pool: &SqlitePool, state: TaskState) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE state = ?")
        .bind(state)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
