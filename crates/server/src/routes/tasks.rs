use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::{caregiver::Caregiver, resident::Resident, task::Task};
use services::services::{directory::TaskView, tasks::TaskServiceError};
use tracing::instrument;
use uuid::Uuid;

use super::error::{forbidden_response, database_error_response, task_error_response};
use crate::{
    AppState,
    api::tasks::{
        CreateTaskRequest, DeleteTaskQuery, DeleteTaskResponse, ListTasksQuery,
        ReassignTaskRequest, RejectReassignmentRequest, RequestReassignmentRequest, TaskResponse,
        TasksResponse, UpdateTaskRequest,
    },
    auth::{AuthUser, RequestContext},
};

/// Admins and the task's creator.
fn can_manage(user: &AuthUser, task: &Task) -> bool {
    user.is_admin() || task.created_by == user.id
}

/// Managers plus whoever currently holds the task.
fn can_work(user: &AuthUser, task: &Task) -> bool {
    can_manage(user, task) || task.assigned_to == user.id
}

async fn load_task(state: &AppState, task_id: Uuid) -> Result<Task, Response> {
    state
        .tasks()
        .find(task_id)
        .await
        .map_err(|error| task_error_response(error, "failed to load task"))
}

async fn ensure_caregiver(state: &AppState, caregiver_id: Uuid) -> Result<(), Response> {
    match Caregiver::find_by_id(state.pool(), caregiver_id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(task_error_response(
            TaskServiceError::InvalidInput(format!("caregiver {caregiver_id} not found")),
            "caregiver not found",
        )),
        Err(err) => Err(database_error_response(err, "failed to look up caregiver")),
    }
}

async fn ensure_resident(state: &AppState, resident_id: Uuid) -> Result<(), Response> {
    match Resident::find_by_id(state.pool(), resident_id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(task_error_response(
            TaskServiceError::InvalidInput(format!("resident {resident_id} not found")),
            "resident not found",
        )),
        Err(err) => Err(database_error_response(err, "failed to look up resident")),
    }
}

fn task_response(
    status: StatusCode,
    result: Result<TaskView, TaskServiceError>,
    context: &str,
) -> Response {
    match result {
        Ok(task) => (status, Json(TaskResponse { task })).into_response(),
        Err(error) => task_error_response(error, context),
    }
}

#[instrument(
    name = "tasks.create_task",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id)
)]
pub async fn create_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateTaskRequest>,
) -> Response {
    if let Err(response) = ensure_caregiver(&state, payload.assigned_to).await {
        return response;
    }
    for resident in &payload.residents {
        if let Err(response) = ensure_resident(&state, *resident).await {
            return response;
        }
    }

    match state.tasks().create(payload.into(), ctx.user.id).await {
        Ok(tasks) => (StatusCode::CREATED, Json(TasksResponse { tasks })).into_response(),
        Err(error) => task_error_response(error, "failed to create task"),
    }
}

#[instrument(
    name = "tasks.list_tasks",
    skip(state, ctx, query),
    fields(user_id = %ctx.user.id)
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ListTasksQuery>,
) -> Response {
    match state.tasks().list(query.into()).await {
        Ok(tasks) => (StatusCode::OK, Json(TasksResponse { tasks })).into_response(),
        Err(error) => task_error_response(error, "failed to list tasks"),
    }
}

#[instrument(
    name = "tasks.get_task",
    skip(state, ctx),
    fields(user_id = %ctx.user.id, task_id = %task_id)
)]
pub async fn get_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
) -> Response {
    task_response(
        StatusCode::OK,
        state.tasks().get(task_id).await,
        "failed to load task",
    )
}

#[instrument(
    name = "tasks.update_task",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, task_id = %task_id)
)]
pub async fn update_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if !can_manage(&ctx.user, &existing) {
        return forbidden_response("only an admin or the task creator can edit this task");
    }

    if let Some(caregiver) = payload.assigned_to
        && let Err(response) = ensure_caregiver(&state, caregiver).await
    {
        return response;
    }
    if let Some(resident) = payload.resident
        && let Err(response) = ensure_resident(&state, resident).await
    {
        return response;
    }

    let (changes, apply_to_series) = payload.into_patch();
    match state
        .tasks()
        .update(task_id, changes, apply_to_series)
        .await
    {
        Ok(tasks) => (StatusCode::OK, Json(TasksResponse { tasks })).into_response(),
        Err(error) => task_error_response(error, "failed to update task"),
    }
}

#[instrument(
    name = "tasks.delete_task",
    skip(state, ctx, query),
    fields(user_id = %ctx.user.id, task_id = %task_id, delete_series = query.delete_series)
)]
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
    Query(query): Query<DeleteTaskQuery>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if !can_manage(&ctx.user, &existing) {
        return forbidden_response("only an admin or the task creator can delete this task");
    }

    match state.tasks().delete(task_id, query.delete_series).await {
        Ok(deleted) => (StatusCode::OK, Json(DeleteTaskResponse { deleted })).into_response(),
        Err(error) => task_error_response(error, "failed to delete task"),
    }
}

#[instrument(
    name = "tasks.complete_task",
    skip(state, ctx),
    fields(user_id = %ctx.user.id, task_id = %task_id)
)]
pub async fn complete_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if !can_work(&ctx.user, &existing) {
        return forbidden_response(
            "only the assignee, the creator or an admin can complete this task",
        );
    }

    task_response(
        StatusCode::OK,
        state.tasks().complete(task_id).await,
        "failed to complete task",
    )
}

#[instrument(
    name = "tasks.reopen_task",
    skip(state, ctx),
    fields(user_id = %ctx.user.id, task_id = %task_id)
)]
pub async fn reopen_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if !can_work(&ctx.user, &existing) {
        return forbidden_response(
            "only the assignee, the creator or an admin can reopen this task",
        );
    }

    task_response(
        StatusCode::OK,
        state.tasks().reopen(task_id).await,
        "failed to reopen task",
    )
}

#[instrument(
    name = "tasks.reassign_task",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, task_id = %task_id, caregiver_id = %payload.caregiver_id)
)]
pub async fn reassign_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<ReassignTaskRequest>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if !can_manage(&ctx.user, &existing) {
        return forbidden_response("only an admin or the task creator can reassign this task");
    }
    if let Err(response) = ensure_caregiver(&state, payload.caregiver_id).await {
        return response;
    }

    task_response(
        StatusCode::OK,
        state.tasks().reassign(task_id, payload.caregiver_id).await,
        "failed to reassign task",
    )
}

#[instrument(
    name = "tasks.request_reassignment",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, task_id = %task_id, caregiver_id = %payload.caregiver_id)
)]
pub async fn request_reassignment(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<RequestReassignmentRequest>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if !can_manage(&ctx.user, &existing) {
        return forbidden_response("only the creator or an admin can request reassignment");
    }
    if let Err(response) = ensure_caregiver(&state, payload.caregiver_id).await {
        return response;
    }

    task_response(
        StatusCode::OK,
        state
            .tasks()
            .request_reassignment(task_id, payload.caregiver_id, ctx.user.id)
            .await,
        "failed to request reassignment",
    )
}

#[instrument(
    name = "tasks.accept_reassignment",
    skip(state, ctx),
    fields(user_id = %ctx.user.id, task_id = %task_id)
)]
pub async fn accept_reassignment(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if existing.reassignment_requested_to != Some(ctx.user.id) {
        return forbidden_response("reassignment was not requested to the acting user");
    }

    task_response(
        StatusCode::OK,
        state.tasks().accept_reassignment(task_id, ctx.user.id).await,
        "failed to accept reassignment",
    )
}

#[instrument(
    name = "tasks.reject_reassignment",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, task_id = %task_id)
)]
pub async fn reject_reassignment(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<RejectReassignmentRequest>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if existing.reassignment_requested_to != Some(ctx.user.id) {
        return forbidden_response("reassignment was not requested to the acting user");
    }

    task_response(
        StatusCode::OK,
        state
            .tasks()
            .reject_reassignment(task_id, ctx.user.id, payload.reason)
            .await,
        "failed to reject reassignment",
    )
}

#[instrument(
    name = "tasks.handle_self",
    skip(state, ctx),
    fields(user_id = %ctx.user.id, task_id = %task_id)
)]
pub async fn handle_self(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if existing.assigned_to != ctx.user.id {
        return forbidden_response("acting user is not the task assignee");
    }

    task_response(
        StatusCode::OK,
        state.tasks().handle_self(task_id, ctx.user.id).await,
        "failed to keep task",
    )
}

#[instrument(
    name = "tasks.duplicate_task",
    skip(state, ctx),
    fields(user_id = %ctx.user.id, task_id = %task_id)
)]
pub async fn duplicate_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(task_id): Path<Uuid>,
) -> Response {
    let existing = match load_task(&state, task_id).await {
        Ok(task) => task,
        Err(response) => return response,
    };
    if !can_manage(&ctx.user, &existing) {
        return forbidden_response(
            "only an admin or the task creator can duplicate this task",
        );
    }

    task_response(
        StatusCode::CREATED,
        state.tasks().duplicate(task_id, ctx.user.id).await,
        "failed to duplicate task",
    )
}

#[instrument(
    name = "tasks.get_series",
    skip(state, ctx),
    fields(user_id = %ctx.user.id, series_id = %series_id)
)]
pub async fn get_series(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(series_id): Path<Uuid>,
) -> Response {
    match state.tasks().series_summary(series_id).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => task_error_response(error, "failed to load task series"),
    }
}
