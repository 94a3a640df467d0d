use axum::{
    Router,
    http::{HeaderName, Request},
    middleware,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span, field};

use crate::{AppState, auth::require_session};

mod directory;
mod error;
mod tasks;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Full HTTP surface. Everything under `/v1` needs a session token.
pub fn router(state: AppState) -> Router {
    let authenticated = task_routes()
        .merge(directory_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(health))
        .merge(authenticated)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
        .with_state(state)
}

fn task_routes() -> Router<AppState> {
    let reassignment = Router::new()
        .route("/request", post(tasks::request_reassignment))
        .route("/accept", post(tasks::accept_reassignment))
        .route("/reject", post(tasks::reject_reassignment))
        .route("/handle-self", post(tasks::handle_self));

    let actions = Router::new()
        .route("/complete", post(tasks::complete_task))
        .route("/reopen", post(tasks::reopen_task))
        .route("/reassign", post(tasks::reassign_task))
        .route("/duplicate", post(tasks::duplicate_task))
        .nest("/reassignment", reassignment);

    Router::new()
        .route("/v1/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/v1/tasks/{task_id}",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .nest("/v1/tasks/{task_id}", actions)
        .route("/v1/series/{series_id}", get(tasks::get_series))
}

fn directory_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/caregivers", post(directory::create_caregiver))
        .route("/v1/residents", post(directory::create_resident))
}

/// One span per request, tagged with the id `SetRequestIdLayer` assigned.
fn request_span<B>(request: &Request<B>) -> Span {
    let span = tracing::info_span!(
        "care_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = field::Empty,
    );
    if let Some(id) = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
    {
        span.record("request_id", id);
    }
    span
}

async fn health() -> &'static str {
    "ok"
}
