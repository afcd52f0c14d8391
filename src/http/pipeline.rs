//! Ordered middleware pipeline.
//!
//! The request path is an explicit list of stages, outermost first.
//! `apply` wraps the router so the first stage sees the request first and
//! the response last.
//!
//! ```text
//! Compression → RequestId → Trace → Timeout → SecurityHeaders → ClientIp
//!     → Routing → RateLimit → Csrf → Session → ResponseCache → dispatch
//! ```

use std::time::Duration;

use axum::{extract::Request, middleware, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::{
        predicate::{NotForContentType, Predicate, SizeAbove},
        CompressionLayer,
    },
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
    CompressionLevel,
};

use crate::cache::response::response_cache_middleware;
use crate::config::ServerConfig;
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::state::AppState;
use crate::routing::route_middleware;
use crate::security::client_ip::client_ip_middleware;
use crate::security::csrf::csrf_middleware;
use crate::security::headers::security_headers_middleware;
use crate::security::rate_limit::rate_limit_middleware;
use crate::session::middleware::session_middleware;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compression(CompressionLevel),
    RequestId,
    Trace,
    Timeout(Duration),
    SecurityHeaders,
    ClientIp,
    Routing,
    RateLimit,
    Csrf,
    Session,
    ResponseCache,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Compression(_) => "compression",
            Stage::RequestId => "request_id",
            Stage::Trace => "trace",
            Stage::Timeout(_) => "timeout",
            Stage::SecurityHeaders => "security_headers",
            Stage::ClientIp => "client_ip",
            Stage::Routing => "routing",
            Stage::RateLimit => "rate_limit",
            Stage::Csrf => "csrf",
            Stage::Session => "session",
            Stage::ResponseCache => "response_cache",
        }
    }
}

/// Map a configured compression level. `None` for "none" or unknown names.
pub fn compression_level(name: &str) -> Option<CompressionLevel> {
    match name.to_ascii_lowercase().as_str() {
        "fastest" => Some(CompressionLevel::Fastest),
        "default" => Some(CompressionLevel::Default),
        "best" => Some(CompressionLevel::Best),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
    min_compress_size: u16,
}

impl Pipeline {
    /// Stages enabled by `config`, outermost first.
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut stages = Vec::new();

        if config.compression.enabled {
            if let Some(level) = compression_level(&config.compression.level) {
                stages.push(Stage::Compression(level));
            }
        }
        stages.push(Stage::RequestId);
        stages.push(Stage::Trace);
        stages.push(Stage::Timeout(Duration::from_secs(config.timeouts.request_secs)));
        stages.push(Stage::SecurityHeaders);
        stages.push(Stage::ClientIp);
        stages.push(Stage::Routing);
        if config.rate_limit.enabled {
            stages.push(Stage::RateLimit);
        }
        if config.csrf.enabled {
            stages.push(Stage::Csrf);
        }
        stages.push(Stage::Session);
        stages.push(Stage::ResponseCache);

        Self {
            stages,
            min_compress_size: config.compression.min_size,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Index of the first stage named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name() == name)
    }

    /// Wrap `router` in every stage.
    #[allow(deprecated)]
    pub fn apply(&self, router: Router, state: &AppState) -> Router {
        // Innermost first, so the first stage ends up outermost.
        self.stages.iter().rev().fold(router, |router, stage| match *stage {
            Stage::Compression(level) => router.layer(
                CompressionLayer::new()
                    .quality(level)
                    .compress_when(SizeAbove::new(self.min_compress_size).and(NotForContentType::IMAGES)),
            ),
            Stage::RequestId => router.layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            ),
            Stage::Trace => router.layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request_id(request.headers()).unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            })),
            Stage::Timeout(timeout) => router.layer(TimeoutLayer::new(timeout)),
            Stage::SecurityHeaders => router.layer(middleware::from_fn_with_state(
                state.clone(),
                security_headers_middleware,
            )),
            Stage::ClientIp => {
                router.layer(middleware::from_fn_with_state(state.clone(), client_ip_middleware))
            }
            Stage::Routing => {
                router.layer(middleware::from_fn_with_state(state.clone(), route_middleware))
            }
            Stage::RateLimit => {
                router.layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
            }
            Stage::Csrf => router.layer(middleware::from_fn_with_state(state.clone(), csrf_middleware)),
            Stage::Session => {
                router.layer(middleware::from_fn_with_state(state.clone(), session_middleware))
            }
            Stage::ResponseCache => router.layer(middleware::from_fn_with_state(
                state.clone(),
                response_cache_middleware,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pipeline: &Pipeline) -> Vec<&'static str> {
        pipeline.stages().iter().map(Stage::name).collect()
    }

    #[test]
    fn test_full_order() {
        let mut config = ServerConfig::default();
        config.rate_limit.enabled = true;
        let pipeline = Pipeline::from_config(&config);
        assert_eq!(
            names(&pipeline),
            vec![
                "compression",
                "request_id",
                "trace",
                "timeout",
                "security_headers",
                "client_ip",
                "routing",
                "rate_limit",
                "csrf",
                "session",
                "response_cache",
            ]
        );
    }

    #[test]
    fn test_security_stages_precede_dispatch_state() {
        let mut config = ServerConfig::default();
        config.rate_limit.enabled = true;
        let pipeline = Pipeline::from_config(&config);
        let pos = |name| pipeline.position(name).unwrap();

        assert!(pos("client_ip") < pos("rate_limit"));
        assert!(pos("routing") < pos("rate_limit"));
        assert!(pos("rate_limit") < pos("csrf"));
        assert!(pos("csrf") < pos("session"));
        assert!(pos("session") < pos("response_cache"));
    }

    #[test]
    fn test_optional_stages() {
        let mut config = ServerConfig::default();
        config.compression.level = "none".into();
        config.csrf.enabled = false;
        let pipeline = Pipeline::from_config(&config);

        assert!(pipeline.position("compression").is_none());
        assert!(pipeline.position("rate_limit").is_none());
        assert!(pipeline.position("csrf").is_none());
        assert_eq!(pipeline.stages()[0], Stage::RequestId);
    }

    #[test]
    fn test_compression_level_names() {
        assert_eq!(compression_level("fastest"), Some(CompressionLevel::Fastest));
        assert_eq!(compression_level("BEST"), Some(CompressionLevel::Best));
        assert_eq!(compression_level("none"), None);
        assert_eq!(compression_level("ultra"), None);
    }
}
