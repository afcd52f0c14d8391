//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, graceful shutdown)
//!     → pipeline.rs (ordered middleware stages)
//!     → handler.rs (decode props, call the engine)
//!     → engine.rs (ScriptEngine trait, ScriptResponse)
//!     → Send to client
//! ```
//!
//! `state.rs` holds the shared components; `cookies.rs`, `form.rs` and
//! `request.rs` are helpers used across layers.

pub mod cookies;
pub mod engine;
pub mod form;
pub mod handler;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod state;

pub use engine::{EngineError, ScriptBody, ScriptContext, ScriptEngine, ScriptRequest, ScriptResponse};
pub use pipeline::{Pipeline, Stage};
pub use request::X_REQUEST_ID;
pub use server::{build_router, HttpServer};
pub use state::AppState;
