//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (security headers on the way out)
//!     → client_ip.rs (resolve the caller, honouring trusted proxies)
//!     → rate_limit.rs (per-IP token buckets, per-route overrides)
//!     → csrf.rs (double-submit token on mutating requests)
//!     → Pass to sessions and the engine
//! ```
//!
//! # Design Decisions
//! - Fail closed: a failed check ends the request with 403, 413 or 429
//! - No trust in client input: forwarded headers only from trusted peers
//! - Token comparisons are constant time

pub mod client_ip;
pub mod csrf;
pub mod headers;
pub mod rate_limit;

pub use client_ip::ClientIp;
pub use csrf::{CsrfGuard, CsrfToken};
pub use headers::SecurityHeaders;
pub use rate_limit::RateLimiter;
