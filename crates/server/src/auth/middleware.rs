use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::{AuthError, AuthUser};
use crate::AppState;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: AuthUser,
}

fn bearer_token(request: &Request<Body>) -> Result<&str, AuthError> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let user = match bearer_token(&request).and_then(|token| state.jwt().verify(token)) {
        Ok(user) => user,
        Err(err) => {
            tracing::debug!(?err, "rejected session");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid or missing session token" })),
            )
                .into_response();
        }
    };

    request.extensions_mut().insert(RequestContext { user });
    next.run(request).await
}
