//! Script engine interface.
//!
//! Page content comes from an external engine. The server hands it the
//! decoded request plus the trust-boundary services (session, CSRF token,
//! fragment cache, literal codec) and turns its result into a response.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cache::FragmentCache;
use crate::config::RouteConfig;
use crate::pln::{PropValue, SignedLiteralCodec};
use crate::session::SessionHandle;

/// Request as seen by a script.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Query and form parameters, signed literals verified.
    pub props: BTreeMap<String, PropValue>,
    pub body: Bytes,
    pub route: Option<Arc<RouteConfig>>,
    pub client_ip: Option<IpAddr>,
    pub request_id: Option<String>,
}

impl ScriptRequest {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.props.get(name)
    }
}

/// Services available to a script for the duration of one request.
pub struct ScriptContext<'a> {
    /// `None` when sessions are disabled.
    pub session: Option<&'a SessionHandle>,
    pub csrf_token: Option<&'a str>,
    pub fragments: &'a FragmentCache,
    /// `None` when no secret is configured.
    pub literals: Option<&'a SignedLiteralCodec>,
    pub dev_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptBody {
    Empty,
    Text(String),
    Html(String),
    Json(serde_json::Value),
}

/// Value produced by evaluating a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ScriptBody,
}

impl ScriptResponse {
    pub fn new(status: StatusCode, body: ScriptBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, ScriptBody::Html(body.into()))
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, ScriptBody::Text(body.into()))
    }

    pub fn json(body: serde_json::Value) -> Self {
        Self::new(StatusCode::OK, ScriptBody::Json(body))
    }

    /// `303 See Other` to `location`.
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::new(StatusCode::SEE_OTHER, ScriptBody::Empty);
        if let Ok(value) = HeaderValue::from_str(location) {
            response.headers.insert(header::LOCATION, value);
        }
        response
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for ScriptResponse {
    fn into_response(self) -> Response {
        let (content_type, body) = match self.body {
            ScriptBody::Empty => (None, String::new()),
            ScriptBody::Text(text) => (Some("text/plain; charset=utf-8"), text),
            ScriptBody::Html(html) => (Some("text/html; charset=utf-8"), html),
            ScriptBody::Json(json) => (Some("application/json"), json.to_string()),
        };

        let mut response = (self.status, body).into_response();
        let headers = response.headers_mut();
        headers.remove(header::CONTENT_TYPE);
        if let Some(content_type) = content_type.filter(|_| !self.headers.contains_key(header::CONTENT_TYPE)) {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        for (name, value) in self.headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        response
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no script handles this path")]
    NotFound,

    #[error("script failed: {0}")]
    Script(String),
}

/// Evaluates a script for a request.
///
/// Called on the async worker; implementations must not block for long.
pub trait ScriptEngine: Send + Sync {
    fn evaluate(
        &self,
        request: &ScriptRequest,
        ctx: &ScriptContext<'_>,
    ) -> Result<ScriptResponse, EngineError>;
}
