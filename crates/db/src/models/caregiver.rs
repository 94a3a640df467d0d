use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CaregiverRole {
    Admin,
    Caregiver,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Caregiver {
    pub id: Uuid,
    pub full_name: String,
    pub role: CaregiverRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCaregiver {
    pub full_name: String,
    pub role: CaregiverRole,
}

impl Caregiver {
    pub async fn create(pool: &SqlitePool, data: &CreateCaregiver) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Caregiver>(
            r#"
            INSERT INTO caregivers (id, full_name, role, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.full_name)
        .bind(data.role)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Caregiver>("SELECT * FROM caregivers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
