use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Resident {
    pub id: Uuid,
    pub full_name: String,
    pub room_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResident {
    pub full_name: String,
    pub room_number: Option<String>,
}

impl Resident {
    pub async fn create(pool: &SqlitePool, data: &CreateResident) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Resident>(
            r#"
            INSERT INTO residents (id, full_name, room_number, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.full_name)
        .bind(&data.room_number)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Resident>("SELECT * FROM residents WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
