//! webguard: a security and caching front end for server-rendered sites.
//!
//! Every request passes an ordered pipeline (compression, request id,
//! tracing, timeout, security headers, client IP, routing, rate limiting,
//! CSRF, encrypted cookie sessions, response cache) before a
//! [`ScriptEngine`](http::ScriptEngine) renders the page.

pub mod admin;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod demo;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pln;
pub mod routing;
pub mod security;
pub mod session;

pub use config::ServerConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
