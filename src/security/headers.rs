//! Security response headers.
//!
//! # Responsibilities
//! - Add browser hardening headers to every response
//! - Add HSTS outside development mode
//! - Disable browser caching in development mode
//!
//! # Design Decisions
//! - Header values are validated once at startup, not per request
//! - Headers already set by the handler are left alone
//! - Empty config values disable the corresponding header

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::config::SecurityConfig;
use crate::http::state::AppState;

/// Precomputed set of response headers.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &SecurityConfig, dev_mode: bool) -> Self {
        let mut set = Self::default();

        if dev_mode {
            set.push(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate");
            set.push(header::PRAGMA, "no-cache");
            set.push(header::EXPIRES, "0");
        }

        if !config.enable_headers {
            return set;
        }

        if !dev_mode && config.hsts.enabled {
            let mut hsts = format!("max-age={}", config.hsts.max_age_secs);
            if config.hsts.include_subdomains {
                hsts.push_str("; includeSubDomains");
            }
            if config.hsts.preload {
                hsts.push_str("; preload");
            }
            set.push(header::STRICT_TRANSPORT_SECURITY, &hsts);
        }

        set.push(header::X_CONTENT_TYPE_OPTIONS, &config.content_type_options);
        set.push(header::X_FRAME_OPTIONS, &config.frame_options);
        set.push(header::X_XSS_PROTECTION, &config.xss_protection);
        set.push(header::REFERRER_POLICY, &config.referrer_policy);
        set.push(header::CONTENT_SECURITY_POLICY, &config.content_security_policy);
        set.push(HeaderName::from_static("permissions-policy"), &config.permissions_policy);

        set
    }

    fn push(&mut self, name: HeaderName, value: &str) {
        if value.is_empty() {
            return;
        }
        match HeaderValue::from_str(value) {
            Ok(value) => self.headers.push((name, value)),
            Err(_) => tracing::warn!(header = %name, "Ignoring invalid security header value"),
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    state.security_headers.apply(response.headers_mut());
    response
}
