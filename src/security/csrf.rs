//! CSRF double-submit guard.
//!
//! # Responsibilities
//! - Issue a random token cookie, or reuse the client's existing one
//! - Require the token to be echoed (form field or header) on mutating requests
//! - Reject failures with 403, detailed only in development mode
//!
//! # Design Decisions
//! - The mutating method set is a fixed allow-list: POST, PUT, PATCH, DELETE
//! - Any missing piece fails closed
//! - Diagnostics never show more than a 16 character token prefix

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookie::{Cookie, SameSite};

use crate::crypto::{constant_time_eq, random_hex};
use crate::http::cookies::{append_set_cookie, request_cookie};
use crate::http::form::{field, form_encoding, form_fields};
use crate::http::state::AppState;
use crate::observability::metrics;

/// Cookie carrying the token.
pub const CSRF_COOKIE: &str = "_csrf";
/// Form field carrying the echoed token.
pub const CSRF_FIELD: &str = "_csrf";
/// Header carrying the echoed token (AJAX).
pub const CSRF_HEADER: &str = "x-csrf-token";

const TOKEN_BYTES: usize = 32;
/// Hex length of a token.
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;
const PREVIEW_LEN: usize = 16;

const MUTATING_METHODS: [&str; 4] = ["POST", "PUT", "PATCH", "DELETE"];

/// Token for the current request, available to handlers through extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

/// Result of [`CsrfGuard::issue_or_reuse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    /// A cookie must be set for this token.
    pub is_new: bool,
}

pub fn is_mutating_method(method: &str) -> bool {
    MUTATING_METHODS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method))
}

#[derive(Debug, Clone)]
pub struct CsrfGuard {
    enabled: bool,
    dev_mode: bool,
}

impl CsrfGuard {
    pub fn new(enabled: bool, dev_mode: bool) -> Self {
        Self { enabled, dev_mode }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Reuse the cookie token when it has the expected length, otherwise mint one.
    pub fn issue_or_reuse(&self, headers: &HeaderMap) -> IssuedToken {
        match request_cookie(headers, CSRF_COOKIE) {
            Some(token) if token.len() == TOKEN_LEN => IssuedToken {
                token,
                is_new: false,
            },
            _ => IssuedToken {
                token: random_hex(TOKEN_BYTES),
                is_new: true,
            },
        }
    }

    /// Check a request. Non-mutating methods always pass.
    ///
    /// `form_token` is the `_csrf` form field, preferred over the header.
    pub fn validate(&self, method: &str, headers: &HeaderMap, form_token: Option<&str>) -> bool {
        if !is_mutating_method(method) {
            return true;
        }

        let Some(cookie_token) = request_cookie(headers, CSRF_COOKIE).filter(|t| !t.is_empty())
        else {
            return false;
        };

        match submitted_token(headers, form_token) {
            Some(submitted) => constant_time_eq(cookie_token.as_bytes(), submitted.as_bytes()),
            None => false,
        }
    }

    /// `_csrf` cookie: HttpOnly, SameSite=Strict, Secure outside development mode.
    pub fn cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build((CSRF_COOKIE, token.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(!self.dev_mode)
            .build()
    }

    /// 403 response for a failed check.
    pub fn rejection(&self, headers: &HeaderMap, form_token: Option<&str>) -> Response {
        let body = if self.dev_mode {
            let cookie_token = request_cookie(headers, CSRF_COOKIE);
            let submitted = submitted_token(headers, form_token);
            diagnostic_page(cookie_token.as_deref(), submitted.as_deref())
        } else {
            "403 Forbidden".to_string()
        };

        (
            StatusCode::FORBIDDEN,
            [(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
            body,
        )
            .into_response()
    }
}

fn submitted_token(headers: &HeaderMap, form_token: Option<&str>) -> Option<String> {
    form_token
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
}

fn preview(token: Option<&str>) -> String {
    match token {
        None | Some("") => "(missing)".to_string(),
        Some(token) if token.chars().count() > PREVIEW_LEN => {
            let prefix: String = token.chars().take(PREVIEW_LEN).collect();
            format!("{}...", escape_html(&prefix))
        }
        Some(token) => escape_html(token),
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn diagnostic_page(cookie_token: Option<&str>, submitted: Option<&str>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>403 Forbidden</title></head>
<body>
<h1>403 Forbidden</h1>
<p>CSRF token validation failed.</p>
<ul>
  <li>Token from cookie: {}</li>
  <li>Token from form/header: {}</li>
</ul>
<p>Forms must include a hidden <code>{CSRF_FIELD}</code> field carrying the token.</p>
<p>AJAX requests may send it in the header instead:</p>
<pre>X-CSRF-Token: &lt;token&gt;</pre>
</body>
</html>"#,
        preview(cookie_token),
        preview(submitted),
    )
}

/// Validate mutating requests, expose the token, set the cookie for new visitors.
///
/// URL-encoded and multipart form bodies are buffered (up to
/// `listener.max_body_size`) to read the `_csrf` field and handed on unchanged.
pub async fn csrf_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let guard = &state.csrf;
    let issued = guard.issue_or_reuse(request.headers());

    let mut request = request;
    if guard.is_enabled() && is_mutating_method(request.method().as_str()) {
        let mut form_token = None;

        if let Some(encoding) = form_encoding(request.headers()) {
            let (parts, body) = request.into_parts();
            let bytes = match axum::body::to_bytes(body, state.config.listener.max_body_size).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
                }
            };
            let fields = form_fields(&encoding, bytes.clone()).await;
            form_token = field(&fields, CSRF_FIELD).map(str::to_string);
            request = Request::from_parts(parts, Body::from(bytes));
        }

        if !guard.validate(request.method().as_str(), request.headers(), form_token.as_deref()) {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "CSRF validation failed"
            );
            metrics::record_csrf_rejected();
            return guard.rejection(request.headers(), form_token.as_deref());
        }
    }

    request.extensions_mut().insert(CsrfToken(issued.token.clone()));
    let mut response = next.run(request).await;

    if issued.is_new {
        append_set_cookie(response.headers_mut(), &guard.cookie(&issued.token));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(c: char) -> String {
        std::iter::repeat(c).take(TOKEN_LEN).collect()
    }

    fn with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{CSRF_COOKIE}={value}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_mutating_methods() {
        for m in ["POST", "put", "Patch", "DELETE"] {
            assert!(is_mutating_method(m));
        }
        for m in ["GET", "HEAD", "OPTIONS", "TRACE", "PROPFIND"] {
            assert!(!is_mutating_method(m));
        }
    }

    #[test]
    fn test_issue_new_token() {
        let guard = CsrfGuard::new(true, false);
        let issued = guard.issue_or_reuse(&HeaderMap::new());
        assert!(issued.is_new);
        assert_eq!(issued.token.len(), TOKEN_LEN);
        assert!(issued.token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_reuse_only_full_length_tokens() {
        let guard = CsrfGuard::new(true, false);
        let existing = token('a');
        let issued = guard.issue_or_reuse(&with_cookie(&existing));
        assert_eq!(issued, IssuedToken { token: existing, is_new: false });

        let issued = guard.issue_or_reuse(&with_cookie("short"));
        assert!(issued.is_new);
        assert_ne!(issued.token, "short");
    }

    #[test]
    fn test_get_never_rejected() {
        let guard = CsrfGuard::new(true, false);
        assert!(guard.validate("GET", &HeaderMap::new(), None));
        assert!(guard.validate("GET", &with_cookie(&token('a')), Some("wrong")));
    }

    #[test]
    fn test_post_with_matching_form_token() {
        let guard = CsrfGuard::new(true, false);
        let t = token('b');
        assert!(guard.validate("POST", &with_cookie(&t), Some(&t)));
    }

    #[test]
    fn test_post_with_matching_header_token() {
        let guard = CsrfGuard::new(true, false);
        let t = token('c');
        let mut headers = with_cookie(&t);
        headers.insert(CSRF_HEADER, HeaderValue::from_str(&t).unwrap());
        assert!(guard.validate("DELETE", &headers, None));
        assert!(guard.validate("DELETE", &headers, Some("")));
    }

    #[test]
    fn test_post_failures() {
        let guard = CsrfGuard::new(true, false);
        let t = token('d');
        assert!(!guard.validate("POST", &HeaderMap::new(), Some(&t)));
        assert!(!guard.validate("POST", &with_cookie(&t), None));
        assert!(!guard.validate("POST", &with_cookie(&t), Some(&token('e'))));
        assert!(!guard.validate("POST", &with_cookie(""), Some("")));
    }

    #[test]
    fn test_form_token_preferred_over_header() {
        let guard = CsrfGuard::new(true, false);
        let t = token('f');
        let mut headers = with_cookie(&t);
        headers.insert(CSRF_HEADER, HeaderValue::from_str(&t).unwrap());
        assert!(!guard.validate("POST", &headers, Some(&token('0'))));
    }

    #[test]
    fn test_cookie_attributes() {
        let prod = CsrfGuard::new(true, false).cookie("tok");
        assert_eq!(prod.name(), CSRF_COOKIE);
        assert_eq!(prod.http_only(), Some(true));
        assert_eq!(prod.same_site(), Some(SameSite::Strict));
        assert_eq!(prod.secure(), Some(true));
        assert_eq!(prod.path(), Some("/"));

        let dev = CsrfGuard::new(true, true).cookie("tok");
        assert_eq!(dev.secure(), Some(false));
    }

    #[test]
    fn test_preview_truncates_and_escapes() {
        assert_eq!(preview(None), "(missing)");
        assert_eq!(preview(Some("")), "(missing)");
        assert_eq!(preview(Some(&token('a'))), format!("{}...", "a".repeat(16)));
        assert_eq!(preview(Some("<b>")), "&lt;b&gt;");
    }

    #[test]
    fn test_dev_page_never_shows_full_token() {
        let t = token('9');
        let page = diagnostic_page(Some(&t), None);
        assert!(!page.contains(&t));
        assert!(page.contains("(missing)"));
    }
}
