//! Per-key token bucket rate limiting.
//!
//! # Responsibilities
//! - Keep one token bucket per caller-supplied key
//! - Refill in whole windows, capped at the limit
//! - Gate requests by signed-in user or client IP, with per-route overrides
//!
//! # Design Decisions
//! - Buckets live in a sharded `DashMap`: a key's read-modify-write holds
//!   only its shard lock, so unrelated keys do not contend
//! - An absent limiter allows everything (rate limiting is optional)
//! - Idle buckets are pruned by a background task, never before their
//!   window has passed

use std::net::IpAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::http::state::AppState;
use crate::observability::metrics;
use crate::routing::MatchedRoute;
use crate::security::client_ip::ClientIp;

/// Key used when the caller supplies an empty one.
pub const GLOBAL_KEY: &str = "__global__";

const FALLBACK_LIMIT: u32 = 60;
const FALLBACK_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
    last_seen: Instant,
    /// Window of the most recent request; the bucket refills fully after it.
    window: Duration,
}

impl TokenBucket {
    fn new(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            tokens: limit,
            last_refill: now,
            last_seen: now,
            window,
        }
    }

    fn try_acquire(&mut self, limit: u32, window: Duration, now: Instant) -> bool {
        self.last_seen = now;
        self.window = window;

        let elapsed = now.saturating_duration_since(self.last_refill);
        let windows = elapsed.as_nanos() / window.as_nanos();
        if windows > 0 {
            let refill = u128::from(limit).saturating_mul(windows);
            let tokens = (u128::from(self.tokens) + refill).min(u128::from(limit));
            self.tokens = tokens as u32;
            self.last_refill = now;
        }

        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}

/// Token bucket rate limiter keyed by arbitrary strings.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    default_limit: u32,
    default_window: Duration,
}

impl RateLimiter {
    /// Zero limit or window falls back to 60 requests per minute.
    pub fn new(default_limit: u32, default_window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            default_limit: if default_limit == 0 { FALLBACK_LIMIT } else { default_limit },
            default_window: if default_window.is_zero() {
                FALLBACK_WINDOW
            } else {
                default_window
            },
        }
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    pub fn default_window(&self) -> Duration {
        self.default_window
    }

    /// Take one token from `key`'s bucket.
    ///
    /// A new bucket starts with `limit - 1` tokens. Zero `limit` or `window`
    /// use the limiter's defaults.
    pub fn allow(&self, key: &str, limit: u32, window: Duration) -> bool {
        let key = if key.is_empty() { GLOBAL_KEY } else { key };
        let limit = if limit == 0 { self.default_limit } else { limit };
        let window = if window.is_zero() { self.default_window } else { window };
        let now = Instant::now();

        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return bucket.try_acquire(limit, window, now);
        }

        // Another request may have inserted the bucket since the lookup above.
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(limit, window, now));
        bucket.try_acquire(limit, window, now)
    }

    /// [`allow`](Self::allow) with the limiter's default limit and window.
    pub fn allow_default(&self, key: &str) -> bool {
        self.allow(key, self.default_limit, self.default_window)
    }

    /// Drop buckets unused for `max_idle` and for at least their own window.
    ///
    /// A bucket idle for a whole window would be full again, so removing it
    /// never grants a client more than the limit. Returns the number removed.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let before = self.buckets.len();
        let now = Instant::now();
        self.buckets.retain(|_, bucket| {
            now.saturating_duration_since(bucket.last_seen) < max_idle.max(bucket.window)
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Rate limit check that tolerates a missing limiter.
pub fn allow(limiter: Option<&RateLimiter>, key: &str, limit: u32, window: Duration) -> bool {
    match limiter {
        Some(limiter) => limiter.allow(key, limit, window),
        None => true,
    }
}

/// Bucket key: `user:<id>` for a signed-in user, else `ip:<address>`.
pub fn client_key(user_id: Option<&str>, ip: Option<IpAddr>) -> String {
    match (user_id, ip) {
        (Some(id), _) => format!("user:{id}"),
        (None, Some(ip)) => format!("ip:{ip}"),
        (None, None) => GLOBAL_KEY.to_string(),
    }
}

/// Middleware limiting requests per signed-in user or client IP.
///
/// The user comes from the `user_id` session value, read without
/// committing anything. Uses the matched route's override when it has one. Refused requests get
/// `429 Too Many Requests` with `Retry-After` set to the window length.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.limiter.as_deref() else {
        return next.run(request).await;
    };

    let user = state
        .sessions
        .as_deref()
        .and_then(|store| store.load(request.headers()).user_id());
    let ip = request.extensions().get::<ClientIp>().map(|ip| ip.0);
    let key = client_key(user.as_deref(), ip);

    let (limit, window) = request
        .extensions()
        .get::<MatchedRoute>()
        .and_then(|route| route.0.rate_limit.as_ref())
        .map(|o| (o.requests, Duration::from_secs(o.window_secs)))
        .unwrap_or((limiter.default_limit(), limiter.default_window()));

    if allow(Some(limiter), &key, limit, window) {
        return next.run(request).await;
    }

    tracing::warn!(client = %key, limit, window_secs = window.as_secs(), "Rate limit exceeded");
    metrics::record_rate_limited();

    let mut response = (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    let retry_after = window.as_secs().max(1).to_string();
    if let Ok(value) = HeaderValue::from_str(&retry_after) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_allows_exactly_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));
        let window = Duration::from_secs(1);
        assert!(limiter.allow("user", 3, window));
        assert!(limiter.allow("user", 3, window));
        assert!(limiter.allow("user", 3, window));
        assert!(!limiter.allow("user", 3, window));
    }

    #[test]
    fn test_refills_after_window() {
        let limiter = RateLimiter::new(3, Duration::from_millis(50));
        let window = Duration::from_millis(50);
        for _ in 0..3 {
            assert!(limiter.allow("user", 3, window));
        }
        assert!(!limiter.allow("user", 3, window));

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.allow("user", 3, window));
    }

    #[test]
    fn test_refill_is_capped_at_limit() {
        let mut bucket = TokenBucket::new(0, Duration::from_secs(1), Instant::now());
        let later = bucket.last_refill + Duration::from_secs(10);
        assert!(bucket.try_acquire(3, Duration::from_secs(1), later));
        assert_eq!(bucket.tokens, 2);
        assert_eq!(bucket.last_refill, later);
    }

    #[test]
    fn test_partial_window_does_not_refill() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(0, Duration::from_secs(1), start);
        assert!(!bucket.try_acquire(3, Duration::from_secs(1), start + Duration::from_millis(999)));
        assert_eq!(bucket.last_refill, start);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.allow_default("a"));
        assert!(!limiter.allow_default("a"));
        assert!(limiter.allow_default("b"));
    }

    #[test]
    fn test_missing_limiter_allows() {
        for _ in 0..100 {
            assert!(allow(None, "anyone", 1, Duration::from_secs(60)));
        }
    }

    #[test]
    fn test_empty_key_and_zero_values_use_defaults() {
        let limiter = RateLimiter::new(0, Duration::ZERO);
        assert_eq!(limiter.default_limit(), 60);
        assert_eq!(limiter.default_window(), Duration::from_secs(60));

        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.allow("", 0, Duration::ZERO));
        assert!(limiter.allow(GLOBAL_KEY, 0, Duration::ZERO));
        assert!(!limiter.allow("", 0, Duration::ZERO));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_prune_idle() {
        let window = Duration::from_millis(5);
        let limiter = RateLimiter::new(5, window);
        limiter.allow("a", 5, window);
        limiter.allow("b", 5, window);
        assert_eq!(limiter.prune_idle(Duration::from_secs(60)), 0);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.prune_idle(Duration::from_millis(10)), 2);
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn test_prune_keeps_exhausted_bucket_inside_its_window() {
        let limiter = RateLimiter::new(60, Duration::from_secs(60));
        let hour = Duration::from_secs(3600);
        assert!(limiter.allow("ip:10.0.0.1", 1, hour));
        assert!(!limiter.allow("ip:10.0.0.1", 1, hour));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.prune_idle(Duration::from_millis(10)), 0);
        assert!(!limiter.allow("ip:10.0.0.1", 1, hour));
    }

    #[test]
    fn test_recent_use_keeps_bucket() {
        let window = Duration::from_millis(1);
        let limiter = RateLimiter::new(5, window);
        limiter.allow("a", 5, window);
        std::thread::sleep(Duration::from_millis(30));
        limiter.allow("a", 5, window);
        assert_eq!(limiter.prune_idle(Duration::from_millis(25)), 0);
    }

    #[test]
    fn test_client_key_prefers_user() {
        let ip: IpAddr = "192.0.2.7".parse().unwrap();
        assert_eq!(client_key(Some("42"), Some(ip)), "user:42");
        assert_eq!(client_key(None, Some(ip)), "ip:192.0.2.7");
        assert_eq!(client_key(None, None), GLOBAL_KEY);
    }

    #[test]
    fn test_concurrent_acquire_never_exceeds_limit() {
        let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..20).filter(|_| limiter.allow_default("shared")).count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }
}
