//! Task status lookup.

use axum::extract::{Path, State};
use axum::Json;
use database::{task, Task, TaskState};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: String,
    pub kind: String,
    pub state: TaskState,
    pub attempts: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
    pub result: Option<Value>,
    pub correlation_id: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Task> for TaskView {
    fn from(t: Task) -> Self {
        Self {
            result: t.result.as_deref().and_then(|r| serde_json::from_str(r).ok()),
            id: t.id,
            kind: t.kind,
            state: t.state,
            attempts: t.attempts,
            max_attempts: t.max_attempts,
            last_error: t.last_error,
            correlation_id: t.correlation_id,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

pub async fn get(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskView>> {
    let found = task::get_task(state.db.pool(), &task_id).await?;
    Ok(Json(found.into()))
}
