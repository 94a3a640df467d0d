use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, types::Json};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Assigned,
    Completed,
    Delayed,
    RequestReassignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskCategory {
    Meals,
    Medication,
    Therapy,
    Outing,
}

/// How often a recurring task repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Annually,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown recurrence `{0}`")]
pub struct UnknownRecurrence(pub String);

impl FromStr for Recurrence {
    type Err = UnknownRecurrence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            "annually" | "yearly" => Ok(Recurrence::Annually),
            _ => Err(UnknownRecurrence(s.to_string())),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Annually => "annually",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub series_id: Option<Uuid>,
    pub title: String,
    pub details: String,
    pub notes: String,
    #[sqlx(json)]
    pub media: Vec<String>,
    pub status: TaskStatus,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub recurring: Option<Recurrence>,
    pub end_recurring_date: Option<NaiveDate>,
    pub remind_prior: Option<i64>,
    pub assigned_to: Uuid,
    pub resident: Uuid,
    pub created_by: Uuid,
    pub reassignment_requested_to: Option<Uuid>,
    pub reassignment_requested_by: Option<Uuid>,
    pub reassignment_rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub series_id: Option<Uuid>,
    pub title: String,
    pub details: String,
    pub notes: String,
    pub media: Vec<String>,
    pub status: TaskStatus,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub recurring: Option<Recurrence>,
    pub end_recurring_date: Option<NaiveDate>,
    pub remind_prior: Option<i64>,
    pub assigned_to: Uuid,
    pub resident: Uuid,
    pub created_by: Uuid,
}

/// Filters pushed down to the store. Status is left to the caller because
/// the stored value can lag behind the overdue check.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub assigned_to: Option<Uuid>,
    pub resident: Option<Uuid>,
    pub series_id: Option<Uuid>,
    pub search: Option<String>,
}

/// A partial write. `None` leaves a column untouched; for nullable columns
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub details: Option<String>,
    pub notes: Option<String>,
    pub media: Option<Vec<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Option<TaskPriority>>,
    pub category: Option<Option<TaskCategory>>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub recurring: Option<Option<Recurrence>>,
    pub end_recurring_date: Option<Option<NaiveDate>>,
    pub remind_prior: Option<Option<i64>>,
    pub assigned_to: Option<Uuid>,
    pub resident: Option<Uuid>,
    pub reassignment_requested_to: Option<Option<Uuid>>,
    pub reassignment_requested_by: Option<Option<Uuid>>,
    pub reassignment_rejection_reason: Option<Option<String>>,
    pub finished_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    fn push_assignments(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let mut set = builder.separated(", ");
        set.push("updated_at = ").push_bind_unseparated(Utc::now());

        if let Some(title) = &self.title {
            set.push("title = ").push_bind_unseparated(title.clone());
        }
        if let Some(details) = &self.details {
            set.push("details = ").push_bind_unseparated(details.clone());
        }
        if let Some(notes) = &self.notes {
            set.push("notes = ").push_bind_unseparated(notes.clone());
        }
        if let Some(media) = &self.media {
            set.push("media = ").push_bind_unseparated(Json(media.clone()));
        }
        if let Some(status) = self.status {
            set.push("status = ").push_bind_unseparated(status);
        }
        if let Some(priority) = self.priority {
            set.push("priority = ").push_bind_unseparated(priority);
        }
        if let Some(category) = self.category {
            set.push("category = ").push_bind_unseparated(category);
        }
        if let Some(start_date) = self.start_date {
            set.push("start_date = ").push_bind_unseparated(start_date);
        }
        if let Some(due_date) = self.due_date {
            set.push("due_date = ").push_bind_unseparated(due_date);
        }
        if let Some(recurring) = self.recurring {
            set.push("recurring = ").push_bind_unseparated(recurring);
        }
        if let Some(end_recurring_date) = self.end_recurring_date {
            set.push("end_recurring_date = ")
                .push_bind_unseparated(end_recurring_date);
        }
        if let Some(remind_prior) = self.remind_prior {
            set.push("remind_prior = ").push_bind_unseparated(remind_prior);
        }
        if let Some(assigned_to) = self.assigned_to {
            set.push("assigned_to = ").push_bind_unseparated(assigned_to);
        }
        if let Some(resident) = self.resident {
            set.push("resident = ").push_bind_unseparated(resident);
        }
        if let Some(requested_to) = self.reassignment_requested_to {
            set.push("reassignment_requested_to = ")
                .push_bind_unseparated(requested_to);
        }
        if let Some(requested_by) = self.reassignment_requested_by {
            set.push("reassignment_requested_by = ")
                .push_bind_unseparated(requested_by);
        }
        if let Some(reason) = &self.reassignment_rejection_reason {
            set.push("reassignment_rejection_reason = ")
                .push_bind_unseparated(reason.clone());
        }
        if let Some(finished_at) = self.finished_at {
            set.push("finished_at = ").push_bind_unseparated(finished_at);
        }
    }
}

/// Makes `%`, `_` and `\` match literally inside a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Task {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_series(
        pool: &SqlitePool,
        series_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE series_id = $1 ORDER BY start_date ASC",
        )
        .bind(series_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &SqlitePool, filter: &TaskFilter) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM tasks WHERE 1 = 1");

        if let Some(priority) = filter.priority {
            builder.push(" AND priority = ").push_bind(priority);
        }
        if let Some(category) = filter.category {
            builder.push(" AND category = ").push_bind(category);
        }
        if let Some(assigned_to) = filter.assigned_to {
            builder.push(" AND assigned_to = ").push_bind(assigned_to);
        }
        if let Some(resident) = filter.resident {
            builder.push(" AND resident = ").push_bind(resident);
        }
        if let Some(series_id) = filter.series_id {
            builder.push(" AND series_id = ").push_bind(series_id);
        }
        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = format!("%{}%", escape_like(search));
            builder
                .push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(r" ESCAPE '\' OR details LIKE ")
                .push_bind(pattern.clone())
                .push(r" ESCAPE '\' OR notes LIKE ")
                .push_bind(pattern)
                .push(r" ESCAPE '\')");
        }

        builder.push(" ORDER BY start_date ASC");
        builder.build_query_as::<Task>().fetch_all(pool).await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateTask) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (
                id,
                series_id,
                title,
                details,
                notes,
                media,
                status,
                priority,
                category,
                start_date,
                due_date,
                recurring,
                end_recurring_date,
                remind_prior,
                assigned_to,
                resident,
                created_by,
                created_at,
                updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.series_id)
        .bind(&data.title)
        .bind(&data.details)
        .bind(&data.notes)
        .bind(Json(&data.media))
        .bind(data.status)
        .bind(data.priority)
        .bind(data.category)
        .bind(data.start_date)
        .bind(data.due_date)
        .bind(data.recurring)
        .bind(data.end_recurring_date)
        .bind(data.remind_prior)
        .bind(data.assigned_to)
        .bind(data.resident)
        .bind(data.created_by)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Applies `patch` to one task. Returns `None` when no row has that id.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE tasks SET ");
        patch.push_assignments(&mut builder);
        builder.push(" WHERE id = ").push_bind(id).push(" RETURNING *");
        builder.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// Applies `patch` to every task in a series and returns the number of rows touched.
    pub async fn update_series(
        pool: &SqlitePool,
        series_id: Uuid,
        patch: &TaskPatch,
    ) -> Result<u64, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE tasks SET ");
        patch.push_assignments(&mut builder);
        builder.push(" WHERE series_id = ").push_bind(series_id);
        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Compare-and-set on status. Returns `None` if the task is not currently in `from`.
    pub async fn transition_status(
        pool: &SqlitePool,
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
               SET status = $1,
                   updated_at = $2
             WHERE id = $3
               AND status = $4
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_series(pool: &SqlitePool, series_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE series_id = $1")
            .bind(series_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::DBService;

    fn sample(series_id: Option<Uuid>, start: DateTime<Utc>) -> CreateTask {
        CreateTask {
            series_id,
            title: "Morning medication".to_string(),
            details: "Two tablets with water".to_string(),
            notes: String::new(),
            media: vec!["uploads/chart.png".to_string()],
            status: TaskStatus::Assigned,
            priority: Some(TaskPriority::High),
            category: Some(TaskCategory::Medication),
            start_date: start,
            due_date: start + Duration::hours(1),
            recurring: None,
            end_recurring_date: None,
            remind_prior: Some(15),
            assigned_to: Uuid::new_v4(),
            resident: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
        }
    }

    fn june(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn create_then_find_round_trips_columns() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = Task::create(&db.pool, &sample(None, june(1))).await.unwrap();

        let found = Task::find_by_id(&db.pool, created.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Morning medication");
        assert_eq!(found.media, vec!["uploads/chart.png".to_string()]);
        assert_eq!(found.priority, Some(TaskPriority::High));
        assert_eq!(found.category, Some(TaskCategory::Medication));
        assert_eq!(found.start_date, june(1));
        assert_eq!(found.status, TaskStatus::Assigned);
        assert!(found.finished_at.is_none());
    }

    #[tokio::test]
    async fn patch_can_clear_nullable_columns() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = Task::create(&db.pool, &sample(None, june(1))).await.unwrap();

        let patch = TaskPatch {
            priority: Some(None),
            notes: Some("seen by nurse".to_string()),
            ..Default::default()
        };
        let updated = Task::update(&db.pool, created.id, &patch)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.priority, None);
        assert_eq!(updated.notes, "seen by nurse");
        assert_eq!(updated.category, Some(TaskCategory::Medication));
    }

    #[tokio::test]
    async fn update_of_missing_task_returns_none() {
        let db = DBService::new_in_memory().await.unwrap();
        let patch = TaskPatch {
            notes: Some("x".to_string()),
            ..Default::default()
        };
        assert!(
            Task::update(&db.pool, Uuid::new_v4(), &patch)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn series_writes_touch_only_that_series() {
        let db = DBService::new_in_memory().await.unwrap();
        let series = Uuid::new_v4();
        for day in 1..=3 {
            Task::create(&db.pool, &sample(Some(series), june(day)))
                .await
                .unwrap();
        }
        let loner = Task::create(&db.pool, &sample(None, june(4))).await.unwrap();

        let patch = TaskPatch {
            notes: Some("bring a jacket".to_string()),
            ..Default::default()
        };
        assert_eq!(
            Task::update_series(&db.pool, series, &patch).await.unwrap(),
            3
        );
        let loner = Task::find_by_id(&db.pool, loner.id).await.unwrap().unwrap();
        assert_eq!(loner.notes, "");

        assert_eq!(Task::delete_series(&db.pool, series).await.unwrap(), 3);
        assert!(Task::find_by_series(&db.pool, series).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transition_status_is_conditional() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = Task::create(&db.pool, &sample(None, june(1))).await.unwrap();

        let first = Task::transition_status(
            &db.pool,
            created.id,
            TaskStatus::Assigned,
            TaskStatus::Delayed,
        )
        .await
        .unwrap();
        assert_eq!(first.map(|t| t.status), Some(TaskStatus::Delayed));

        let second = Task::transition_status(
            &db.pool,
            created.id,
            TaskStatus::Assigned,
            TaskStatus::Delayed,
        )
        .await
        .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn find_applies_search_and_filters() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut lunch = sample(None, june(2));
        lunch.title = "Lunch in the garden".to_string();
        lunch.category = Some(TaskCategory::Meals);
        lunch.priority = Some(TaskPriority::Low);
        Task::create(&db.pool, &lunch).await.unwrap();
        Task::create(&db.pool, &sample(None, june(1))).await.unwrap();

        let by_search = Task::find(
            &db.pool,
            &TaskFilter {
                search: Some("GARDEN".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_search.len(), 1);
        assert_eq!(by_search[0].title, "Lunch in the garden");

        let by_category = Task::find(
            &db.pool,
            &TaskFilter {
                category: Some(TaskCategory::Medication),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].title, "Morning medication");

        let all = Task::find(&db.pool, &TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].start_date <= all[1].start_date);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut lunch = sample(None, june(1));
        lunch.title = "Lunch".to_string();
        lunch.details = String::new();
        Task::create(&db.pool, &lunch).await.unwrap();
        let mut walk = sample(None, june(2));
        walk.title = "Walk 50% speed".to_string();
        walk.details = String::new();
        Task::create(&db.pool, &walk).await.unwrap();

        let search = |text: &str| TaskFilter {
            search: Some(text.to_string()),
            ..Default::default()
        };

        let percent = Task::find(&db.pool, &search("%")).await.unwrap();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].title, "Walk 50% speed");

        assert!(Task::find(&db.pool, &search("_")).await.unwrap().is_empty());
        assert!(Task::find(&db.pool, &search("\\")).await.unwrap().is_empty());
        assert_eq!(Task::find(&db.pool, &search("50%")).await.unwrap().len(), 1);
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn recurrence_parses_case_insensitively() {
        assert_eq!("Monthly".parse::<Recurrence>(), Ok(Recurrence::Monthly));
        assert_eq!(" daily ".parse::<Recurrence>(), Ok(Recurrence::Daily));
        assert_eq!("yearly".parse::<Recurrence>(), Ok(Recurrence::Annually));
        assert_eq!(
            "fortnightly".parse::<Recurrence>().unwrap_err().to_string(),
            "unknown recurrence `fortnightly`"
        );
    }
}
