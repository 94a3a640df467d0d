//! Blast radius of edits and deletes on recurring tasks.
//!
//! Each occurrence owns its dates. A series-wide edit fans the shared fields
//! out to every occurrence, but date-bearing fields only ever land on the
//! occurrence that was addressed.

use db::models::task::{Task, TaskPatch};
use sqlx::SqlitePool;

use super::tasks::TaskServiceError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesChanges {
    /// `start_date`, `due_date`, `end_recurring_date`, `recurring`.
    pub dates: TaskPatch,
    /// Everything else.
    pub shared: TaskPatch,
}

pub fn partition(changes: TaskPatch) -> SeriesChanges {
    let dates = TaskPatch {
        start_date: changes.start_date,
        due_date: changes.due_date,
        end_recurring_date: changes.end_recurring_date,
        recurring: changes.recurring,
        ..Default::default()
    };
    let shared = TaskPatch {
        start_date: None,
        due_date: None,
        end_recurring_date: None,
        recurring: None,
        ..changes
    };
    SeriesChanges { dates, shared }
}

/// Writes `changes` to `target`, or across its series when asked to, and
/// returns the rows that were modified as they are now stored.
pub(crate) async fn apply_update(
    pool: &SqlitePool,
    target: &Task,
    changes: TaskPatch,
    apply_to_series: bool,
) -> Result<Vec<Task>, TaskServiceError> {
    let series_id = match (apply_to_series, target.series_id) {
        (true, Some(series_id)) => series_id,
        _ => {
            let updated = Task::update(pool, target.id, &changes)
                .await?
                .ok_or(TaskServiceError::NotFound)?;
            return Ok(vec![updated]);
        }
    };

    let SeriesChanges { dates, shared } = partition(changes);

    if !shared.is_empty() {
        let touched = Task::update_series(pool, series_id, &shared).await?;
        if touched == 0 {
            return Err(TaskServiceError::SeriesNotFound);
        }
        tracing::info!(%series_id, touched, "applied changes across series");
    }

    if !dates.is_empty() {
        match Task::update(pool, target.id, &dates).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(TaskServiceError::NotFound),
            Err(source) if !shared.is_empty() => {
                tracing::error!(
                    ?source,
                    %series_id,
                    task_id = %target.id,
                    "series fields updated but occurrence dates were not"
                );
                return Err(TaskServiceError::PartialSeriesUpdate { series_id, source });
            }
            Err(err) => return Err(err.into()),
        }
    }

    if shared.is_empty() {
        let updated = Task::find_by_id(pool, target.id)
            .await?
            .ok_or(TaskServiceError::NotFound)?;
        Ok(vec![updated])
    } else {
        Ok(Task::find_by_series(pool, series_id).await?)
    }
}

/// Deletes `target`, or its whole series when asked to. Returns rows removed.
pub(crate) async fn apply_delete(
    pool: &SqlitePool,
    target: &Task,
    delete_series: bool,
) -> Result<u64, TaskServiceError> {
    match (delete_series, target.series_id) {
        (true, Some(series_id)) => {
            let removed = Task::delete_series(pool, series_id).await?;
            if removed == 0 {
                return Err(TaskServiceError::SeriesNotFound);
            }
            tracing::info!(%series_id, removed, "deleted task series");
            Ok(removed)
        }
        _ => {
            let removed = Task::delete(pool, target.id).await?;
            if removed == 0 {
                return Err(TaskServiceError::NotFound);
            }
            Ok(removed)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use db::{
        DBService,
        models::task::{CreateTask, Recurrence, TaskPriority, TaskStatus},
    };
    use uuid::Uuid;

    use super::*;

    async fn stored_occurrence(pool: &SqlitePool, series_id: Option<Uuid>) -> Task {
        let start = Utc::now() + Duration::days(1);
        Task::create(
            pool,
            &CreateTask {
                series_id,
                title: "Blood pressure check".to_string(),
                details: String::new(),
                notes: String::new(),
                media: Vec::new(),
                status: TaskStatus::Assigned,
                priority: None,
                category: None,
                start_date: start,
                due_date: start + Duration::hours(1),
                recurring: None,
                end_recurring_date: None,
                remind_prior: None,
                assigned_to: Uuid::new_v4(),
                resident: Uuid::new_v4(),
                created_by: Uuid::new_v4(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn vanished_series_is_series_not_found() {
        let db = DBService::new_in_memory().await.unwrap();
        let series_id = Uuid::new_v4();
        let target = stored_occurrence(&db.pool, Some(series_id)).await;
        Task::delete_series(&db.pool, series_id).await.unwrap();

        let notes = TaskPatch {
            notes: Some("bring the cuff".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            apply_update(&db.pool, &target, notes, true).await,
            Err(TaskServiceError::SeriesNotFound)
        ));
        assert!(matches!(
            apply_delete(&db.pool, &target, true).await,
            Err(TaskServiceError::SeriesNotFound)
        ));
    }

    #[tokio::test]
    async fn failed_date_write_after_shared_write_is_partial() {
        let db = DBService::new_in_memory().await.unwrap();
        let series_id = Uuid::new_v4();
        let target = stored_occurrence(&db.pool, Some(series_id)).await;
        let sibling = stored_occurrence(&db.pool, Some(series_id)).await;
        sqlx::query(
            "CREATE TRIGGER dates_frozen BEFORE UPDATE OF due_date ON tasks \
             BEGIN SELECT RAISE(ABORT, 'dates frozen'); END",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let changes = TaskPatch {
            title: Some("Evening blood pressure".to_string()),
            due_date: Some(target.due_date + Duration::hours(2)),
            ..Default::default()
        };
        let err = apply_update(&db.pool, &target, changes, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TaskServiceError::PartialSeriesUpdate { series_id: id, .. } if id == series_id
        ));

        let sibling = Task::find_by_id(&db.pool, sibling.id).await.unwrap().unwrap();
        assert_eq!(sibling.title, "Evening blood pressure");
        let target_now = Task::find_by_id(&db.pool, target.id).await.unwrap().unwrap();
        assert_eq!(target_now.due_date, target.due_date);
    }

    #[tokio::test]
    async fn failed_date_write_alone_is_a_database_error() {
        let db = DBService::new_in_memory().await.unwrap();
        let target = stored_occurrence(&db.pool, Some(Uuid::new_v4())).await;
        sqlx::query(
            "CREATE TRIGGER dates_frozen BEFORE UPDATE OF due_date ON tasks \
             BEGIN SELECT RAISE(ABORT, 'dates frozen'); END",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let changes = TaskPatch {
            due_date: Some(target.due_date + Duration::hours(2)),
            ..Default::default()
        };
        assert!(matches!(
            apply_update(&db.pool, &target, changes, true).await,
            Err(TaskServiceError::Database(_))
        ));
    }

    #[test]
    fn partition_splits_date_fields_from_the_rest() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let changes = TaskPatch {
            title: Some("Evening medication".to_string()),
            notes: Some("after dinner".to_string()),
            priority: Some(Some(TaskPriority::Medium)),
            start_date: Some(start),
            due_date: Some(start),
            recurring: Some(Some(Recurrence::Weekly)),
            end_recurring_date: Some(NaiveDate::from_ymd_opt(2024, 7, 1)),
            ..Default::default()
        };

        let SeriesChanges { dates, shared } = partition(changes);

        assert_eq!(dates.start_date, Some(start));
        assert_eq!(dates.due_date, Some(start));
        assert_eq!(dates.recurring, Some(Some(Recurrence::Weekly)));
        assert!(dates.title.is_none());
        assert!(dates.notes.is_none());

        assert_eq!(shared.title.as_deref(), Some("Evening medication"));
        assert_eq!(shared.priority, Some(Some(TaskPriority::Medium)));
        assert!(shared.start_date.is_none());
        assert!(shared.due_date.is_none());
        assert!(shared.recurring.is_none());
        assert!(shared.end_recurring_date.is_none());
    }

    #[test]
    fn partition_of_notes_only_has_no_dates() {
        let SeriesChanges { dates, shared } = partition(TaskPatch {
            notes: Some("x".to_string()),
            ..Default::default()
        });
        assert!(dates.is_empty());
        assert!(!shared.is_empty());
    }
}
