//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → MatchedRoute in request extensions, or none
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile matchers
//!     → Sort by priority
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by priority)
//! - Routes carry per-route policy (cache TTL, vary headers, rate limit
//!   override); dispatch itself is the script engine's job

pub mod matcher;
pub mod router;

pub use router::{route_middleware, MatchedRoute, RouteTable};
