//! Script dispatch.
//!
//! Innermost handler of the pipeline: gathers what earlier layers attached
//! to the request, decodes props and asks the engine for a response.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::http::engine::{EngineError, ScriptContext, ScriptRequest};
use crate::http::form::{form_encoding, form_fields};
use crate::http::request::request_id;
use crate::http::state::AppState;
use crate::pln::decode_props;
use crate::routing::MatchedRoute;
use crate::security::client_ip::ClientIp;
use crate::security::csrf::CsrfToken;
use crate::session::SessionHandle;

pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.config.listener.max_body_size).await {
        Ok(body) => body,
        Err(_) => return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response(),
    };

    let form = match form_encoding(&parts.headers) {
        Some(encoding) if !body.is_empty() => form_fields(&encoding, body.clone()).await,
        _ => Vec::new(),
    };
    let props = decode_props(parts.uri.query(), &form, state.literals.as_deref());

    let script_request = ScriptRequest {
        request_id: request_id(&parts.headers).map(str::to_string),
        route: parts.extensions.get::<MatchedRoute>().map(|r| r.0.clone()),
        client_ip: parts.extensions.get::<ClientIp>().map(|ip| ip.0),
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        props,
        body,
    };

    let ctx = ScriptContext {
        session: parts.extensions.get::<SessionHandle>(),
        csrf_token: parts.extensions.get::<CsrfToken>().map(|t| t.0.as_str()),
        fragments: &state.fragments,
        literals: state.literals.as_deref(),
        dev_mode: state.config.dev_mode,
    };

    match state.engine.evaluate(&script_request, &ctx) {
        Ok(response) => response.into_response(),
        Err(EngineError::NotFound) => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
        Err(e) => {
            tracing::error!(
                request_id = script_request.request_id.as_deref().unwrap_or("-"),
                path = %script_request.uri.path(),
                error = %e,
                "Script evaluation failed"
            );
            let body = if state.config.dev_mode {
                format!("500 Internal Server Error\n\n{e}")
            } else {
                "500 Internal Server Error".to_string()
            };
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}
