use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use services::services::tasks::TaskServiceError;

pub(crate) fn task_error_response(error: TaskServiceError, context: &str) -> Response {
    let response = match error {
        TaskServiceError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "task not found" })),
        ),
        TaskServiceError::SeriesNotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "task series not found" })),
        ),
        TaskServiceError::InvalidInput(message) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
        }
        TaskServiceError::PartialSeriesCreate {
            series_id,
            created_ids,
            expected,
            source,
        } => {
            tracing::error!(
                ?source,
                %series_id,
                created = created_ids.len(),
                expected,
                "{context}",
                context = context
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "series was only partially created",
                    "series_id": series_id,
                    "created_ids": created_ids,
                    "expected": expected,
                })),
            )
        }
        TaskServiceError::PartialCreate {
            created_ids,
            expected,
            source,
        } => {
            tracing::error!(
                ?source,
                created = created_ids.len(),
                expected,
                "{context}",
                context = context
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "tasks were only partially created",
                    "created_ids": created_ids,
                    "expected": expected,
                })),
            )
        }
        TaskServiceError::PartialSeriesUpdate { series_id, source } => {
            tracing::error!(?source, %series_id, "{context}", context = context);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "series was only partially updated",
                    "series_id": series_id,
                })),
            )
        }
        TaskServiceError::Database(err) => {
            tracing::error!(?err, "{context}", context = context);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal server error" })),
            )
        }
    };

    response.into_response()
}

pub(crate) fn forbidden_response(message: &str) -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
}

pub(crate) fn database_error_response(err: sqlx::Error, context: &str) -> Response {
    tracing::error!(?err, "{context}", context = context);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal server error" })),
    )
        .into_response()
}

pub(crate) fn bad_request_response(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
