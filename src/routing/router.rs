//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route for a request
//! - Attach the match to request extensions for later layers
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in priority order (acceptable for typical route counts)
//! - Unmatched requests carry no `MatchedRoute`; they get default limits
//!   and are never cached

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::config::RouteConfig;
use crate::http::state::AppState;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// The route a request resolved to, stored in request extensions.
#[derive(Debug, Clone)]
pub struct MatchedRoute(pub Arc<RouteConfig>);

#[derive(Debug)]
struct CompiledRoute {
    config: Arc<RouteConfig>,
    matcher: AndMatcher,
}

/// Routes sorted by descending priority; ties keep config order.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn from_config(routes: Vec<RouteConfig>) -> Self {
        let mut compiled: Vec<CompiledRoute> = routes
            .into_iter()
            .map(|config| {
                let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
                if let Some(host) = &config.host {
                    matchers.push(Box::new(HostMatcher::new(host.clone())));
                }
                if let Some(prefix) = &config.path_prefix {
                    matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
                }
                CompiledRoute {
                    config: Arc::new(config),
                    matcher: AndMatcher::new(matchers),
                }
            })
            .collect();

        // Stable sort keeps config order among equal priorities.
        compiled.sort_by(|a, b| b.config.priority.cmp(&a.config.priority));
        Self { routes: compiled }
    }

    /// First route (by priority) whose conditions all hold.
    pub fn match_request(&self, req: &Request) -> Option<Arc<RouteConfig>> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(req))
            .map(|route| route.config.clone())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Resolve the route and insert [`MatchedRoute`] when one matches.
pub async fn route_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(route) = state.routes.match_request(&request) {
        tracing::trace!(route = %route.name, "Route matched");
        request.extensions_mut().insert(MatchedRoute(route));
    }
    next.run(request).await
}
