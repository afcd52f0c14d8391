//! Encrypted cookie sessions.
//!
//! # Data Flow
//! ```text
//! Request cookie
//!     → store.rs (read cookie, codec.rs decrypt, expiry check)
//!     → fresh SessionData on any failure
//!     → handle.rs (Session: get/set/flash, dirty tracking)
//!     → script engine mutates the session
//!     → handle.rs commit: Skipped | Saved(cookie) | Deleted(cookie)
//!     → middleware.rs appends Set-Cookie
//! ```
//!
//! # Design Decisions
//! - Sessions live entirely in the cookie; the server keeps no session state
//! - A forged or stale cookie is indistinguishable from a new visitor
//! - Concurrent requests from one client: last writer wins

pub mod codec;
pub mod data;
pub mod handle;
pub mod middleware;
pub mod store;
pub mod value;

pub use codec::{decrypt_session, encrypt_session};
pub use data::SessionData;
pub use handle::{CommitOutcome, Session, SessionHandle};
pub use store::CookieSessionStore;
pub use value::Value;
