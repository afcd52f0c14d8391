//! In-memory caches.
//!
//! # Data Flow
//! ```text
//! store.rs (TtlStore<V>: RwLock map, TTL, capacity, hit/miss counters)
//!     → fragment.rs (FragmentCache: rendered HTML strings, used by engines)
//!     → response.rs (ResponseCache: status/headers/body, middleware)
//! ```
//!
//! # Design Decisions
//! - Process-local only; nothing is shared between server instances
//! - Capacity overflow is resolved by eviction, never reported as an error

pub mod fragment;
pub mod response;
pub mod store;

pub use fragment::FragmentCache;
pub use response::{cache_key, CachedResponse, ResponseCache, X_CACHE};
pub use store::{CacheStats, TtlStore};
