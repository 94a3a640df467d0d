//! Admin-only provisioning of the people tasks point at.

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::{caregiver::Caregiver, resident::Resident};
use tracing::instrument;

use super::error::{bad_request_response, forbidden_response, database_error_response};
use crate::{
    AppState,
    api::directory::{
        CaregiverResponse, CreateCaregiverRequest, CreateResidentRequest, ResidentResponse,
    },
    auth::RequestContext,
};

#[instrument(
    name = "directory.create_caregiver",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id)
)]
pub async fn create_caregiver(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateCaregiverRequest>,
) -> Response {
    if !ctx.user.is_admin() {
        return forbidden_response("only admins can add caregivers");
    }
    if payload.full_name.trim().is_empty() {
        return bad_request_response("full_name must not be empty");
    }

    match Caregiver::create(state.pool(), &payload.into()).await {
        Ok(caregiver) => {
            tracing::info!(caregiver_id = %caregiver.id, role = ?caregiver.role, "caregiver added");
            (StatusCode::CREATED, Json(CaregiverResponse { caregiver })).into_response()
        }
        Err(err) => database_error_response(err, "failed to add caregiver"),
    }
}

#[instrument(
    name = "directory.create_resident",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id)
)]
pub async fn create_resident(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateResidentRequest>,
) -> Response {
    if !ctx.user.is_admin() {
        return forbidden_response("only admins can add residents");
    }
    if payload.full_name.trim().is_empty() {
        return bad_request_response("full_name must not be empty");
    }

    match Resident::create(state.pool(), &payload.into()).await {
        Ok(resident) => {
            tracing::info!(resident_id = %resident.id, "resident added");
            (StatusCode::CREATED, Json(ResidentResponse { resident })).into_response()
        }
        Err(err) => database_error_response(err, "failed to add resident"),
    }
}
