//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → lifecycle::startup builds the AppState from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets are wrapped so they cannot be logged by accident

pub mod loader;
pub mod schema;
pub mod secret;
pub mod validation;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, CompressionConfig, CsrfConfig, HstsConfig, ListenerConfig, ObservabilityConfig,
    ProxyConfig, RateLimitConfig, RouteConfig, RouteRateLimit, SecurityConfig, ServerConfig,
    SessionConfig, TimeoutConfig,
};
pub use secret::SecretString;
pub use validation::{validate_config, ValidationError};
