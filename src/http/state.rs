//! Shared application state.
//!
//! Built once at startup and cloned into every middleware and handler.
//! This is the registry for all process-wide components; nothing lives in
//! globals except the metrics recorder.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{FragmentCache, ResponseCache};
use crate::config::{SecretString, ServerConfig};
use crate::http::engine::ScriptEngine;
use crate::pln::SignedLiteralCodec;
use crate::routing::RouteTable;
use crate::security::csrf::CsrfGuard;
use crate::security::headers::SecurityHeaders;
use crate::security::rate_limit::RateLimiter;
use crate::session::CookieSessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// `None` when no secret is available.
    pub sessions: Option<Arc<CookieSessionStore>>,
    /// `None` when no secret is available.
    pub literals: Option<Arc<SignedLiteralCodec>>,
    pub csrf: Arc<CsrfGuard>,
    /// `None` when rate limiting is disabled.
    pub limiter: Option<Arc<RateLimiter>>,
    pub fragments: Arc<FragmentCache>,
    pub responses: Arc<ResponseCache>,
    pub routes: Arc<RouteTable>,
    pub security_headers: Arc<SecurityHeaders>,
    pub engine: Arc<dyn ScriptEngine>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire every component from `config`.
    ///
    /// `secret` keys both the session store and the literal codec; without
    /// one, both are disabled.
    pub fn new(config: ServerConfig, secret: Option<SecretString>, engine: Arc<dyn ScriptEngine>) -> Self {
        let dev_mode = config.dev_mode;

        let sessions = secret.as_ref().map(|secret| {
            Arc::new(CookieSessionStore::new(
                config.session.clone(),
                secret.clone(),
                dev_mode,
            ))
        });
        let literals = secret.map(|secret| Arc::new(SignedLiteralCodec::new(secret)));

        let limiter = config.rate_limit.enabled.then(|| {
            Arc::new(RateLimiter::new(
                config.rate_limit.requests,
                Duration::from_secs(config.rate_limit.window_secs),
            ))
        });

        let response_cache_disabled = dev_mode && !config.cache.dev_cache;

        Self {
            sessions,
            literals,
            csrf: Arc::new(CsrfGuard::new(config.csrf.enabled, dev_mode)),
            limiter,
            fragments: Arc::new(FragmentCache::new(dev_mode, config.cache.fragment_max_entries)),
            responses: Arc::new(ResponseCache::new(
                response_cache_disabled,
                config.cache.response_max_entries,
            )),
            routes: Arc::new(RouteTable::from_config(config.routes.clone())),
            security_headers: Arc::new(SecurityHeaders::from_config(&config.security, dev_mode)),
            engine,
            started_at: Instant::now(),
            config: Arc::new(config),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
