use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::crypto::constant_time_eq;
use crate::http::state::AppState;

/// Require `Authorization: Bearer <admin.api_key>`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = state.config.admin.api_key.expose();
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !expected.is_empty() && constant_time_eq(token.as_bytes(), expected.as_bytes()));

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Admin request rejected");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}
