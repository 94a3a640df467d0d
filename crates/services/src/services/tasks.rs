use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use db::models::task::{
    CreateTask, Recurrence, Task, TaskCategory, TaskFilter, TaskPatch, TaskPriority, TaskStatus,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::{
    directory::{Directory, TaskView, describe},
    overdue::{self, open_status},
    reassignment,
    recurrence::Expansion,
    series,
};

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 255;

#[derive(Debug, Error)]
pub enum TaskServiceError {
    #[error("task not found")]
    NotFound,
    #[error("task series not found")]
    SeriesNotFound,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(
        "series {series_id} partially created: {} of {expected} tasks stored",
        .created_ids.len()
    )]
    PartialSeriesCreate {
        series_id: Uuid,
        /// Every task stored by the call, across all residents.
        created_ids: Vec<Uuid>,
        expected: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error("tasks partially created: {} of {expected} stored", .created_ids.len())]
    PartialCreate {
        created_ids: Vec<Uuid>,
        expected: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error("series {series_id} partially updated")]
    PartialSeriesUpdate {
        series_id: Uuid,
        #[source]
        source: sqlx::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    pub title: String,
    pub details: String,
    pub notes: String,
    pub media: Vec<String>,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub start_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    /// Raw rule as supplied by the caller. An unrecognised rule produces no tasks.
    pub recurring: Option<String>,
    pub end_recurring_date: Option<NaiveDate>,
    pub remind_prior: Option<i64>,
    pub assigned_to: Uuid,
    pub residents: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    /// Only tasks starting on this (UTC) calendar day.
    pub date: Option<NaiveDate>,
    pub filter: TaskFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub series_id: Uuid,
    pub occurrences: usize,
    pub first_start: DateTime<Utc>,
    pub last_start: DateTime<Utc>,
    pub task_ids: Vec<Uuid>,
}

pub fn validate_title(title: &str) -> Result<(), TaskServiceError> {
    let length = title.trim().chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&length) {
        return Err(TaskServiceError::InvalidInput(format!(
            "title must be between {TITLE_MIN_CHARS} and {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_window(start: DateTime<Utc>, due: DateTime<Utc>) -> Result<(), TaskServiceError> {
    if due < start {
        return Err(TaskServiceError::InvalidInput(
            "due_date must not be earlier than start_date".to_string(),
        ));
    }
    Ok(())
}

fn validate_remind_prior(remind_prior: Option<i64>) -> Result<(), TaskServiceError> {
    if remind_prior.is_some_and(|minutes| minutes < 0) {
        return Err(TaskServiceError::InvalidInput(
            "remind_prior must be a non-negative number of minutes".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TaskService {
    pool: SqlitePool,
    directory: Arc<dyn Directory>,
    max_series_occurrences: usize,
}

impl TaskService {
    pub fn new(
        pool: SqlitePool,
        directory: Arc<dyn Directory>,
        max_series_occurrences: usize,
    ) -> Self {
        Self {
            pool,
            directory,
            max_series_occurrences: max_series_occurrences.max(1),
        }
    }

    async fn present(&self, task: Task) -> TaskView {
        describe(self.directory.as_ref(), task).await
    }

    async fn present_all(&self, tasks: Vec<Task>) -> Vec<TaskView> {
        let mut views = Vec::with_capacity(tasks.len());
        for task in tasks {
            views.push(self.present(task).await);
        }
        views
    }

    /// Loads a task with the overdue transition applied.
    pub async fn find(&self, task_id: Uuid) -> Result<Task, TaskServiceError> {
        let task = Task::find_by_id(&self.pool, task_id)
            .await?
            .ok_or(TaskServiceError::NotFound)?;
        Ok(overdue::resolve(&self.pool, task, Utc::now()).await?)
    }

    async fn resolve_all(&self, tasks: Vec<Task>) -> Result<Vec<Task>, TaskServiceError> {
        let now = Utc::now();
        let mut resolved = Vec::with_capacity(tasks.len());
        for task in tasks {
            resolved.push(overdue::resolve(&self.pool, task, now).await?);
        }
        Ok(resolved)
    }

    async fn write(&self, task_id: Uuid, patch: &TaskPatch) -> Result<TaskView, TaskServiceError> {
        let task = Task::update(&self.pool, task_id, patch)
            .await?
            .ok_or(TaskServiceError::NotFound)?;
        let task = overdue::resolve(&self.pool, task, Utc::now()).await?;
        Ok(self.present(task).await)
    }

    /// Creates one task per resident, or one series per resident when a
    /// recurrence is supplied.
    pub async fn create(
        &self,
        input: CreateTaskInput,
        created_by: Uuid,
    ) -> Result<Vec<TaskView>, TaskServiceError> {
        validate_title(&input.title)?;
        validate_remind_prior(input.remind_prior)?;
        let due_date = input.due_date.unwrap_or(input.start_date);
        validate_window(input.start_date, due_date)?;

        let mut residents = input.residents.clone();
        residents.sort();
        residents.dedup();
        if residents.is_empty() {
            return Err(TaskServiceError::InvalidInput(
                "at least one resident is required".to_string(),
            ));
        }

        let template = CreateTask {
            series_id: None,
            title: input.title.trim().to_string(),
            details: input.details.clone(),
            notes: input.notes.clone(),
            media: input.media.clone(),
            status: TaskStatus::Assigned,
            priority: input.priority,
            category: input.category,
            start_date: input.start_date,
            due_date,
            recurring: None,
            end_recurring_date: None,
            remind_prior: input.remind_prior,
            assigned_to: input.assigned_to,
            resident: residents[0],
            created_by,
        };

        let Some(raw_rule) = input.recurring.as_deref() else {
            let rows = residents
                .into_iter()
                .map(|resident| CreateTask {
                    resident,
                    ..template.clone()
                })
                .collect();
            let created = self.insert_all(rows).await?;
            tracing::info!(count = created.len(), "created tasks");
            let created = self.resolve_all(created).await?;
            return Ok(self.present_all(created).await);
        };

        let Some(end_recurring_date) = input.end_recurring_date else {
            return Err(TaskServiceError::InvalidInput(
                "end_recurring_date is required when recurring is set".to_string(),
            ));
        };

        let rule = match raw_rule.parse::<Recurrence>() {
            Ok(rule) => rule,
            Err(err) => {
                tracing::warn!(%err, "unrecognised recurrence, no occurrences created");
                return Ok(Vec::new());
            }
        };

        let dates: Vec<_> = Expansion::new(
            rule,
            input.start_date,
            Some(due_date),
            end_recurring_date,
            None,
        )
        .take(self.max_series_occurrences.saturating_add(1))
        .map(|occurrence| (occurrence.start, occurrence.due))
        .collect();

        if dates.len() > self.max_series_occurrences {
            return Err(TaskServiceError::InvalidInput(format!(
                "recurrence produces more than {} occurrences",
                self.max_series_occurrences
            )));
        }
        if dates.is_empty() {
            tracing::warn!(
                start_date = %input.start_date,
                %end_recurring_date,
                %rule,
                "recurrence window contains no occurrences"
            );
            return Ok(Vec::new());
        }

        let mut rows = Vec::with_capacity(dates.len() * residents.len());
        for resident in residents {
            let series_id = Uuid::new_v4();
            rows.extend(dates.iter().map(|&(start_date, due_date)| CreateTask {
                series_id: Some(series_id),
                start_date,
                due_date,
                resident,
                ..template.clone()
            }));
        }

        let created = self.insert_all(rows).await?;
        tracing::info!(%rule, occurrences = dates.len(), tasks = created.len(), "created task series");
        let created = self.resolve_all(created).await?;
        Ok(self.present_all(created).await)
    }

    /// Inserts `rows` one by one. Rows already stored when an insert fails
    /// stay stored and are reported through the partial-create errors.
    async fn insert_all(&self, rows: Vec<CreateTask>) -> Result<Vec<Task>, TaskServiceError> {
        let expected = rows.len();
        let mut created = Vec::with_capacity(expected);
        for row in &rows {
            match Task::create(&self.pool, row).await {
                Ok(task) => created.push(task),
                Err(source) if created.is_empty() => return Err(source.into()),
                Err(source) => {
                    let created_ids: Vec<Uuid> = created.iter().map(|task| task.id).collect();
                    tracing::error!(
                        ?source,
                        series_id = ?row.series_id,
                        stored = created_ids.len(),
                        expected,
                        "task creation stopped part way"
                    );
                    return Err(match row.series_id {
                        Some(series_id) => TaskServiceError::PartialSeriesCreate {
                            series_id,
                            created_ids,
                            expected,
                            source,
                        },
                        None => TaskServiceError::PartialCreate {
                            created_ids,
                            expected,
                            source,
                        },
                    });
                }
            }
        }
        Ok(created)
    }

    pub async fn list(&self, query: TaskQuery) -> Result<Vec<TaskView>, TaskServiceError> {
        let tasks = Task::find(&self.pool, &query.filter).await?;
        let tasks = self
            .resolve_all(tasks)
            .await?
            .into_iter()
            .filter(|task| query.status.is_none_or(|status| task.status == status))
            .filter(|task| {
                query
                    .date
                    .is_none_or(|date| task.start_date.date_naive() == date)
            })
            .collect();
        Ok(self.present_all(tasks).await)
    }

    pub async fn get(&self, task_id: Uuid) -> Result<TaskView, TaskServiceError> {
        let task = self.find(task_id).await?;
        Ok(self.present(task).await)
    }

    pub async fn update(
        &self,
        task_id: Uuid,
        changes: TaskPatch,
        apply_to_series: bool,
    ) -> Result<Vec<TaskView>, TaskServiceError> {
        if changes.is_empty() {
            return Err(TaskServiceError::InvalidInput(
                "no changes supplied".to_string(),
            ));
        }
        if let Some(title) = changes.title.as_deref() {
            validate_title(title)?;
        }
        validate_remind_prior(changes.remind_prior.flatten())?;

        let target = self.find(task_id).await?;
        validate_window(
            changes.start_date.unwrap_or(target.start_date),
            changes.due_date.unwrap_or(target.due_date),
        )?;

        let changes = TaskPatch {
            title: changes.title.map(|title| title.trim().to_string()),
            ..changes
        };
        let updated = series::apply_update(&self.pool, &target, changes, apply_to_series).await?;
        let updated = self.resolve_all(updated).await?;
        Ok(self.present_all(updated).await)
    }

    /// Returns the number of tasks removed.
    pub async fn delete(&self, task_id: Uuid, delete_series: bool) -> Result<u64, TaskServiceError> {
        let target = Task::find_by_id(&self.pool, task_id)
            .await?
            .ok_or(TaskServiceError::NotFound)?;
        series::apply_delete(&self.pool, &target, delete_series).await
    }

    pub async fn complete(&self, task_id: Uuid) -> Result<TaskView, TaskServiceError> {
        let task = self.find(task_id).await?;
        if task.status == TaskStatus::Completed {
            return Ok(self.present(task).await);
        }

        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            finished_at: Some(Some(Utc::now())),
            reassignment_requested_to: Some(None),
            reassignment_requested_by: Some(None),
            ..Default::default()
        };
        self.write(task_id, &patch).await
    }

    /// Reopens a completed task. The status is re-derived from the due date,
    /// so a past-due task comes back as `Delayed`.
    pub async fn reopen(&self, task_id: Uuid) -> Result<TaskView, TaskServiceError> {
        let task = self.find(task_id).await?;
        if task.status != TaskStatus::Completed {
            return Err(TaskServiceError::InvalidInput(
                "only completed tasks can be reopened".to_string(),
            ));
        }

        let patch = TaskPatch {
            status: Some(open_status(task.due_date, Utc::now())),
            finished_at: Some(None),
            ..Default::default()
        };
        self.write(task_id, &patch).await
    }

    pub async fn reassign(
        &self,
        task_id: Uuid,
        caregiver: Uuid,
    ) -> Result<TaskView, TaskServiceError> {
        let task = self.find(task_id).await?;
        let patch = reassignment::reassign(&task, caregiver, Utc::now());
        tracing::info!(%task_id, from = %task.assigned_to, to = %caregiver, "task reassigned");
        self.write(task_id, &patch).await
    }

    pub async fn request_reassignment(
        &self,
        task_id: Uuid,
        target: Uuid,
        requester: Uuid,
    ) -> Result<TaskView, TaskServiceError> {
        let task = self.find(task_id).await?;
        let patch = reassignment::request(&task, target, requester)?;
        tracing::info!(%task_id, %target, %requester, "reassignment requested");
        self.write(task_id, &patch).await
    }

    pub async fn accept_reassignment(
        &self,
        task_id: Uuid,
        accepting: Uuid,
    ) -> Result<TaskView, TaskServiceError> {
        let task = self.find(task_id).await?;
        let patch = reassignment::accept(&task, accepting, Utc::now())?;
        tracing::info!(%task_id, %accepting, "reassignment accepted");
        self.write(task_id, &patch).await
    }

    pub async fn reject_reassignment(
        &self,
        task_id: Uuid,
        rejecting: Uuid,
        reason: String,
    ) -> Result<TaskView, TaskServiceError> {
        let task = self.find(task_id).await?;
        let patch = reassignment::reject(&task, rejecting, reason, Utc::now())?;
        tracing::info!(%task_id, %rejecting, "reassignment rejected");
        self.write(task_id, &patch).await
    }

    pub async fn handle_self(
        &self,
        task_id: Uuid,
        original_assignee: Uuid,
    ) -> Result<TaskView, TaskServiceError> {
        let task = self.find(task_id).await?;
        let patch = reassignment::handle_self(&task, original_assignee, Utc::now())?;
        tracing::info!(%task_id, %original_assignee, "assignee kept task");
        self.write(task_id, &patch).await
    }

    /// Copies a task into a new one-off task owned by `created_by`.
    pub async fn duplicate(
        &self,
        task_id: Uuid,
        created_by: Uuid,
    ) -> Result<TaskView, TaskServiceError> {
        let source = self.find(task_id).await?;
        let copy = CreateTask {
            series_id: None,
            title: source.title,
            details: source.details,
            notes: source.notes,
            media: source.media,
            status: open_status(source.due_date, Utc::now()),
            priority: source.priority,
            category: source.category,
            start_date: source.start_date,
            due_date: source.due_date,
            recurring: None,
            end_recurring_date: None,
            remind_prior: source.remind_prior,
            assigned_to: source.assigned_to,
            resident: source.resident,
            created_by,
        };
        let task = Task::create(&self.pool, &copy).await?;
        tracing::info!(source_id = %task_id, task_id = %task.id, "task duplicated");
        Ok(self.present(task).await)
    }

    pub async fn series_summary(&self, series_id: Uuid) -> Result<SeriesSummary, TaskServiceError> {
        let tasks = Task::find_by_series(&self.pool, series_id).await?;
        let (Some(first), Some(last)) = (
            tasks.iter().map(|task| task.start_date).min(),
            tasks.iter().map(|task| task.start_date).max(),
        ) else {
            return Err(TaskServiceError::SeriesNotFound);
        };

        Ok(SeriesSummary {
            series_id,
            occurrences: tasks.len(),
            first_start: first,
            last_start: last,
            task_ids: tasks.iter().map(|task| task.id).collect(),
        })
    }
}
