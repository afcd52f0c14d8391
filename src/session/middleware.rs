//! Session load/commit around the inner service.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::http::cookies::append_set_cookie;
use crate::http::state::AppState;
use crate::observability::metrics;
use crate::session::handle::{Session, SessionHandle};

/// Load the session before the handler runs, commit it afterwards.
///
/// Without a configured session store the request passes through and no
/// [`SessionHandle`] is inserted.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(store) = state.sessions.clone() else {
        return next.run(request).await;
    };

    let data = store.load(request.headers());
    let handle = SessionHandle::new(Session::new(data, store));
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let outcome = handle.lock().commit();
    match outcome {
        Ok(outcome) => {
            metrics::record_session_commit(outcome.label());
            if let Some(cookie) = outcome.cookie() {
                append_set_cookie(response.headers_mut(), cookie);
            }
        }
        Err(e) => {
            metrics::record_session_commit("failed");
            tracing::error!(error = %e, "Failed to commit session");
        }
    }

    response
}
