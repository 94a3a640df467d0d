use async_trait::async_trait;
use db::models::{caregiver::Caregiver, resident::Resident, task::Task};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentCard {
    pub name: String,
    pub room: Option<String>,
}

/// Name lookups used to decorate task responses.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn resident(&self, id: Uuid) -> Result<Option<ResidentCard>, DirectoryError>;
    async fn caregiver_name(&self, id: Uuid) -> Result<Option<String>, DirectoryError>;
}

#[derive(Clone)]
pub struct DbDirectory {
    pool: SqlitePool,
}

impl DbDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for DbDirectory {
    async fn resident(&self, id: Uuid) -> Result<Option<ResidentCard>, DirectoryError> {
        Ok(Resident::find_by_id(&self.pool, id)
            .await?
            .map(|resident| ResidentCard {
                name: resident.full_name,
                room: resident.room_number,
            }))
    }

    async fn caregiver_name(&self, id: Uuid) -> Result<Option<String>, DirectoryError> {
        Ok(Caregiver::find_by_id(&self.pool, id)
            .await?
            .map(|caregiver| caregiver.full_name))
    }
}

/// A task with display names resolved for this response only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub assigned_to_name: String,
    pub resident_name: String,
    pub resident_room: String,
    pub reassignment_requested_to_name: Option<String>,
    pub reassignment_requested_by_name: Option<String>,
}

async fn caregiver_label(directory: &dyn Directory, id: Uuid) -> String {
    match directory.caregiver_name(id).await {
        Ok(Some(name)) => name,
        Ok(None) => UNKNOWN.to_string(),
        Err(err) => {
            tracing::warn!(?err, caregiver_id = %id, "caregiver lookup failed");
            UNKNOWN.to_string()
        }
    }
}

pub async fn describe(directory: &dyn Directory, task: Task) -> TaskView {
    let (resident_name, resident_room) = match directory.resident(task.resident).await {
        Ok(Some(card)) => (card.name, card.room.unwrap_or_else(|| UNKNOWN.to_string())),
        Ok(None) => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        Err(err) => {
            tracing::warn!(?err, resident_id = %task.resident, "resident lookup failed");
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        }
    };

    let assigned_to_name = caregiver_label(directory, task.assigned_to).await;
    let reassignment_requested_to_name = match task.reassignment_requested_to {
        Some(id) => Some(caregiver_label(directory, id).await),
        None => None,
    };
    let reassignment_requested_by_name = match task.reassignment_requested_by {
        Some(id) => Some(caregiver_label(directory, id).await),
        None => None,
    };

    TaskView {
        task,
        assigned_to_name,
        resident_name,
        resident_room,
        reassignment_requested_to_name,
        reassignment_requested_by_name,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use db::{
        DBService,
        models::{
            caregiver::{CaregiverRole, CreateCaregiver},
            resident::CreateResident,
            task::{CreateTask, TaskStatus},
        },
    };

    use super::*;

    struct BrokenDirectory;

    #[async_trait]
    impl Directory for BrokenDirectory {
        async fn resident(&self, _id: Uuid) -> Result<Option<ResidentCard>, DirectoryError> {
            Err(DirectoryError::Database(sqlx::Error::PoolClosed))
        }

        async fn caregiver_name(&self, _id: Uuid) -> Result<Option<String>, DirectoryError> {
            Err(DirectoryError::Database(sqlx::Error::PoolClosed))
        }
    }

    fn create_task(assigned_to: Uuid, resident: Uuid) -> CreateTask {
        let start = Utc::now() + Duration::hours(1);
        CreateTask {
            series_id: None,
            title: "Breakfast".to_string(),
            details: String::new(),
            notes: String::new(),
            media: Vec::new(),
            status: TaskStatus::Assigned,
            priority: None,
            category: None,
            start_date: start,
            due_date: start,
            recurring: None,
            end_recurring_date: None,
            remind_prior: None,
            assigned_to,
            resident,
            created_by: assigned_to,
        }
    }

    #[tokio::test]
    async fn describe_resolves_names_from_the_store() {
        let db = DBService::new_in_memory().await.unwrap();
        let nurse = Caregiver::create(
            &db.pool,
            &CreateCaregiver {
                full_name: "Ada Nurse".to_string(),
                role: CaregiverRole::Caregiver,
            },
        )
        .await
        .unwrap();
        let resident = Resident::create(
            &db.pool,
            &CreateResident {
                full_name: "Edith Wells".to_string(),
                room_number: Some("12B".to_string()),
            },
        )
        .await
        .unwrap();
        let task = Task::create(&db.pool, &create_task(nurse.id, resident.id))
            .await
            .unwrap();

        let view = describe(&DbDirectory::new(db.pool.clone()), task).await;
        assert_eq!(view.assigned_to_name, "Ada Nurse");
        assert_eq!(view.resident_name, "Edith Wells");
        assert_eq!(view.resident_room, "12B");
        assert!(view.reassignment_requested_to_name.is_none());
    }

    #[tokio::test]
    async fn lookup_failures_fall_back_to_unknown() {
        let db = DBService::new_in_memory().await.unwrap();
        let task = Task::create(&db.pool, &create_task(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let missing = describe(&DbDirectory::new(db.pool.clone()), task.clone()).await;
        assert_eq!(missing.assigned_to_name, UNKNOWN);
        assert_eq!(missing.resident_room, UNKNOWN);

        let broken = describe(&BrokenDirectory, task).await;
        assert_eq!(broken.resident_name, UNKNOWN);
        assert_eq!(broken.assigned_to_name, UNKNOWN);
    }
}
