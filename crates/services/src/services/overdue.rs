//! Read-time overdue transition.
//!
//! There is no background sweep. A task nobody reads keeps its stored status
//! until the next read resolves it.

use chrono::{DateTime, Utc};
use db::models::task::{Task, TaskStatus};
use sqlx::SqlitePool;

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.status != TaskStatus::Completed && now > task.due_date
}

/// Status an open task should hold given its due date.
pub fn open_status(due_date: DateTime<Utc>, now: DateTime<Utc>) -> TaskStatus {
    if now > due_date {
        TaskStatus::Delayed
    } else {
        TaskStatus::Assigned
    }
}

/// Moves an `Assigned` task past its due date to `Delayed` and persists it.
/// Completed tasks and pending reassignment requests are left alone.
pub async fn resolve(
    pool: &SqlitePool,
    task: Task,
    now: DateTime<Utc>,
) -> Result<Task, sqlx::Error> {
    if task.status != TaskStatus::Assigned || !is_overdue(&task, now) {
        return Ok(task);
    }

    match Task::transition_status(pool, task.id, TaskStatus::Assigned, TaskStatus::Delayed)
        .await?
    {
        Some(updated) => {
            tracing::debug!(task_id = %updated.id, due_date = %updated.due_date, "task is overdue");
            Ok(updated)
        }
        // Lost a race with another writer: return whatever is stored now.
        None => Ok(Task::find_by_id(pool, task.id).await?.unwrap_or(task)),
    }
}
