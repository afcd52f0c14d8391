//! Whole-response cache for GET requests on cacheable routes.
//!
//! # Responsibilities
//! - Key responses by method, path, raw query and the route's vary headers
//! - Replay stored status, headers and body on a hit (`X-Cache: HIT`)
//! - Capture and store 2xx responses on a miss (`X-Cache: MISS`)
//!
//! # Design Decisions
//! - Only GET on routes with a positive `cache_ttl_secs` touches the cache
//! - Non-2xx responses are never stored
//! - Bodies above `cache.max_response_size` pass through uncached
//! - Session and CSRF cookies are added by outer layers, so they are never
//!   part of a stored response

use std::time::Duration;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::cache::store::{CacheStats, TtlStore};
use crate::http::state::AppState;
use crate::observability::metrics;
use crate::routing::MatchedRoute;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    fn into_response_with(self, cache_status: &'static str) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
            .headers_mut()
            .insert(X_CACHE, HeaderValue::from_static(cache_status));
        response
    }
}

/// Hex SHA-256 of `METHOD:path?query` plus `\nname=value` per vary header.
pub fn cache_key(method: &Method, uri: &Uri, headers: &HeaderMap, vary: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(uri.path().as_bytes());
    hasher.update(b"?");
    hasher.update(uri.query().unwrap_or("").as_bytes());
    for name in vary {
        let value = headers
            .get(name.as_str())
            .map(HeaderValue::as_bytes)
            .unwrap_or_default();
        hasher.update(b"\n");
        hasher.update(name.to_ascii_lowercase().as_bytes());
        hasher.update(b"=");
        hasher.update(value);
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct ResponseCache {
    store: TtlStore<CachedResponse>,
}

impl ResponseCache {
    pub fn new(disabled: bool, max_entries: usize) -> Self {
        Self {
            store: TtlStore::new(max_entries, disabled),
        }
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let cached = self.store.get(key);
        metrics::record_cache_lookup("response", cached.is_some());
        cached
    }

    /// Store a response. Non-2xx statuses and zero TTLs are ignored.
    pub fn set(&self, key: impl Into<String>, response: CachedResponse, ttl: Duration) -> bool {
        if !response.status.is_success() {
            return false;
        }
        let size = response.body.len();
        self.store.insert(key, response, ttl, size)
    }

    pub fn prune(&self) -> usize {
        self.store.prune()
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}

/// Serve GET requests on cacheable routes from the cache, filling it on a miss.
pub async fn response_cache_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }
    let Some(route) = request
        .extensions()
        .get::<MatchedRoute>()
        .filter(|route| route.0.cache_ttl_secs > 0)
        .cloned()
    else {
        return next.run(request).await;
    };

    let key = cache_key(request.method(), request.uri(), request.headers(), &route.0.vary);
    if let Some(cached) = state.responses.get(&key) {
        tracing::debug!(route = %route.0.name, "Response cache hit");
        return cached.into_response_with("HIT");
    }

    let response = next.run(request).await;
    let max_size = state.config.cache.max_response_size;
    let (mut parts, body) = response.into_parts();

    if body.size_hint().lower() > max_size as u64 {
        tracing::debug!(route = %route.0.name, max_size, "Response too large to cache, passing through");
        parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
        return Response::from_parts(parts, body);
    }

    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(route = %route.0.name, error = %e, "Failed to buffer response for caching");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    let captured = CachedResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    };
    let ttl = Duration::from_secs(route.0.cache_ttl_secs);
    if captured.body.len() <= max_size && state.responses.set(key, captured.clone(), ttl) {
        tracing::debug!(route = %route.0.name, ttl_secs = ttl.as_secs(), "Response cached");
    }

    let mut response = captured.into_response_with("MISS");
    *response.version_mut() = parts.version;
    response.extensions_mut().extend(parts.extensions);
    response
}
