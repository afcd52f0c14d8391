//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::config::secret::SecretString;

/// Placeholder admin key; validation refuses it outside development mode.
pub const PLACEHOLDER_ADMIN_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Development mode: relaxed cookie security, caches off, verbose errors.
    pub dev_mode: bool,

    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Encrypted cookie session settings.
    pub session: SessionConfig,

    /// CSRF guard settings.
    pub csrf: CsrfConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Fragment and response cache settings.
    pub cache: CacheConfig,

    /// Response compression.
    pub compression: CompressionConfig,

    /// Security response headers.
    pub security: SecurityConfig,

    /// Trusted reverse proxy settings.
    pub proxy: ProxyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Route definitions.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum buffered request/response body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Cookie session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Encryption secret. "auto" generates one in development mode.
    pub secret: SecretString,

    /// Session lifetime in seconds.
    pub max_age_secs: u64,

    /// Session cookie name.
    pub cookie_name: String,

    /// HTTPS-only cookie. Unset means true outside development mode.
    pub secure: Option<bool>,

    /// Hide the cookie from JavaScript.
    pub http_only: bool,

    /// SameSite policy: "Lax", "Strict" or "None".
    pub same_site: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: SecretString::new("auto"),
            max_age_secs: 24 * 60 * 60,
            cookie_name: "_webguard_session".to_string(),
            secure: None,
            http_only: true,
            same_site: "Lax".to_string(),
        }
    }
}

/// CSRF guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Validate tokens on mutating requests.
    pub enabled: bool,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per window per client.
    pub requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Buckets idle longer than this are pruned.
    pub idle_prune_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests: 60,
            window_secs: 60,
            idle_prune_secs: 600,
        }
    }
}

/// Fragment and response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached fragments.
    pub fragment_max_entries: usize,

    /// Maximum number of cached responses.
    pub response_max_entries: usize,

    /// Enable response caching in development mode.
    pub dev_cache: bool,

    /// Interval for pruning expired responses, in seconds.
    pub prune_interval_secs: u64,

    /// Largest response body stored by the response cache, in bytes.
    pub max_response_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fragment_max_entries: 1000,
            response_max_entries: 1000,
            dev_cache: false,
            prune_interval_secs: 60,
            max_response_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Response compression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Enable compression.
    pub enabled: bool,

    /// "none", "fastest", "default" or "best".
    pub level: String,

    /// Responses smaller than this are sent uncompressed.
    pub min_size: u16,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "default".to_string(),
            min_size: 1024,
        }
    }
}

/// Security response headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    pub hsts: HstsConfig,
    pub content_type_options: String,
    pub frame_options: String,
    pub xss_protection: String,
    pub referrer_policy: String,
    pub content_security_policy: String,
    pub permissions_policy: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            hsts: HstsConfig::default(),
            content_type_options: "nosniff".to_string(),
            frame_options: "DENY".to_string(),
            xss_protection: "1; mode=block".to_string(),
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
            content_security_policy: String::new(),
            permissions_policy: String::new(),
        }
    }
}

/// Strict-Transport-Security settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HstsConfig {
    pub enabled: bool,
    pub max_age_secs: u64,
    pub include_subdomains: bool,
    pub preload: bool,
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_secs: 31_536_000,
            include_subdomains: true,
            preload: false,
        }
    }
}

/// Reverse proxy trust settings for client IP extraction.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Honour X-Forwarded-For / X-Real-IP.
    pub trusted: bool,

    /// Only honour forwarded headers from these peers (empty = any peer).
    pub trusted_ips: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "json" or "pretty".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: SecretString,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: SecretString::new(PLACEHOLDER_ADMIN_KEY),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Route configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match).
    pub host: Option<String>,

    /// Path prefix to match.
    pub path_prefix: Option<String>,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// Response cache TTL in seconds (0 = not cacheable).
    #[serde(default)]
    pub cache_ttl_secs: u64,

    /// Request headers that take part in the response cache key.
    #[serde(default)]
    pub vary: Vec<String>,

    /// Per-route rate limit override.
    #[serde(default)]
    pub rate_limit: Option<RouteRateLimit>,
}

impl RouteConfig {
    /// A catch-all route with no caching.
    pub fn new(name: impl Into<String>, path_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
            path_prefix: Some(path_prefix.into()),
            priority: 0,
            cache_ttl_secs: 0,
            vary: Vec::new(),
            rate_limit: None,
        }
    }
}

/// Per-route token bucket parameters.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RouteRateLimit {
    pub requests: u32,
    pub window_secs: u64,
}
