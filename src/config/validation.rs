//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ages, windows, capacities > 0)
//! - Reject unusable option combinations (SameSite=None without Secure,
//!   unknown compression level, placeholder admin key in production)
//! - Detect duplicate routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{ServerConfig, PLACEHOLDER_ADMIN_KEY};

/// Accepted compression levels.
pub const COMPRESSION_LEVELS: [&str; 4] = ["none", "fastest", "default", "best"];

/// Accepted SameSite policies.
pub const SAME_SITE_POLICIES: [&str; 3] = ["Lax", "Strict", "None"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Session
    let session = &config.session;
    if session.max_age_secs == 0 {
        errors.push(ValidationError::new("session.max_age_secs", "must be greater than 0"));
    }
    if session.cookie_name.trim().is_empty() {
        errors.push(ValidationError::new("session.cookie_name", "must not be empty"));
    }
    if !SAME_SITE_POLICIES.contains(&session.same_site.as_str()) {
        errors.push(ValidationError::new(
            "session.same_site",
            format!("unknown policy {:?} (expected Lax, Strict or None)", session.same_site),
        ));
    }
    if session.same_site == "None" && session.secure == Some(false) {
        errors.push(ValidationError::new(
            "session.secure",
            "SameSite=None requires a Secure cookie",
        ));
    }

    // Rate limiting
    if config.rate_limit.requests == 0 {
        errors.push(ValidationError::new("rate_limit.requests", "must be greater than 0"));
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }

    // Caches
    if config.cache.fragment_max_entries == 0 {
        errors.push(ValidationError::new("cache.fragment_max_entries", "must be greater than 0"));
    }
    if config.cache.response_max_entries == 0 {
        errors.push(ValidationError::new("cache.response_max_entries", "must be greater than 0"));
    }
    if config.cache.max_response_size == 0 {
        errors.push(ValidationError::new("cache.max_response_size", "must be greater than 0"));
    }

    // Compression
    if !COMPRESSION_LEVELS.contains(&config.compression.level.as_str()) {
        errors.push(ValidationError::new(
            "compression.level",
            format!("unknown level {:?}", config.compression.level),
        ));
    }

    // Timeouts
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    // Observability
    if !matches!(config.observability.log_format.as_str(), "json" | "pretty") {
        errors.push(ValidationError::new(
            "observability.log_format",
            "must be \"json\" or \"pretty\"",
        ));
    }

    // Admin
    if config.admin.enabled && !config.dev_mode {
        let key = config.admin.api_key.expose();
        if key.is_empty() || key == PLACEHOLDER_ADMIN_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "a real API key is required outside development mode",
            ));
        }
    }

    // Routes
    let mut names = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::new(
                format!("routes[{i}].name"),
                format!("duplicate route name {:?}", route.name),
            ));
        }
        if let Some(prefix) = &route.path_prefix {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::new(
                    format!("routes[{i}].path_prefix"),
                    "must start with '/'",
                ));
            }
        }
        if let Some(limit) = route.rate_limit {
            if limit.requests == 0 || limit.window_secs == 0 {
                errors.push(ValidationError::new(
                    format!("routes[{i}].rate_limit"),
                    "requests and window_secs must be greater than 0",
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
