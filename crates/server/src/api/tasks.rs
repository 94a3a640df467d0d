use chrono::{DateTime, NaiveDate, Utc};
use db::models::task::{
    Recurrence, TaskCategory, TaskFilter, TaskPatch, TaskPriority, TaskStatus,
};
use serde::{Deserialize, Serialize};
use services::services::{
    directory::TaskView,
    tasks::{CreateTaskInput, TaskQuery},
};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub media: Vec<String>,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub start_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub recurring: Option<String>,
    pub end_recurring_date: Option<NaiveDate>,
    pub remind_prior: Option<i64>,
    pub assigned_to: Uuid,
    pub residents: Vec<Uuid>,
}

impl From<CreateTaskRequest> for CreateTaskInput {
    fn from(v: CreateTaskRequest) -> Self {
        Self {
            title: v.title,
            details: v.details,
            notes: v.notes,
            media: v.media,
            priority: v.priority,
            category: v.category,
            start_date: v.start_date,
            due_date: v.due_date,
            recurring: v.recurring,
            end_recurring_date: v.end_recurring_date,
            remind_prior: v.remind_prior,
            assigned_to: v.assigned_to,
            residents: v.residents,
        }
    }
}

/// Absent fields are left alone; `null` clears a nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub details: Option<String>,
    pub notes: Option<String>,
    pub media: Option<Vec<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub priority: Option<Option<TaskPriority>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub category: Option<Option<TaskCategory>>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub recurring: Option<Option<Recurrence>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub end_recurring_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub remind_prior: Option<Option<i64>>,
    pub assigned_to: Option<Uuid>,
    pub resident: Option<Uuid>,
    #[serde(default)]
    pub apply_to_series: bool,
}

impl UpdateTaskRequest {
    pub fn into_patch(self) -> (TaskPatch, bool) {
        let patch = TaskPatch {
            title: self.title,
            details: self.details,
            notes: self.notes,
            media: self.media,
            priority: self.priority,
            category: self.category,
            start_date: self.start_date,
            due_date: self.due_date,
            recurring: self.recurring,
            end_recurring_date: self.end_recurring_date,
            remind_prior: self.remind_prior,
            assigned_to: self.assigned_to,
            resident: self.resident,
            ..Default::default()
        };
        (patch, self.apply_to_series)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub search: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub resident: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub series_id: Option<Uuid>,
}

impl From<ListTasksQuery> for TaskQuery {
    fn from(v: ListTasksQuery) -> Self {
        Self {
            status: v.status,
            date: v.date,
            filter: TaskFilter {
                priority: v.priority,
                category: v.category,
                assigned_to: v.assigned_to,
                resident: v.resident,
                series_id: v.series_id,
                search: v.search,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteTaskQuery {
    #[serde(default)]
    pub delete_series: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignTaskRequest {
    pub caregiver_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestReassignmentRequest {
    pub caregiver_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectReassignmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: TaskView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksResponse {
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTaskResponse {
    pub deleted: u64,
}
