//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration and apply command line overrides
//! - Resolve the session secret
//! - Initialize all components in dependency order
//! - Start background maintenance (cache and limiter pruning)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{read_config, validate_config, ConfigError, SecretString, ServerConfig};
use crate::http::engine::ScriptEngine;
use crate::http::state::AppState;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialise logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read the config file (or defaults), force dev mode if asked, then validate.
pub fn prepare_config(path: Option<&Path>, dev_mode: bool) -> Result<ServerConfig, StartupError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ServerConfig::default(),
    };
    if dev_mode {
        config.dev_mode = true;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// The configured secret, a random one in dev mode, or `None`.
///
/// Without a secret, sessions and signed literals are disabled.
pub fn resolve_secret(config: &ServerConfig) -> Option<SecretString> {
    let secret = &config.session.secret;
    if !secret.is_auto() {
        return Some(secret.clone());
    }
    if config.dev_mode {
        tracing::info!("Generated a random session secret; sessions will not survive a restart");
        return Some(SecretString::generate());
    }
    tracing::warn!("No session secret configured; sessions and signed literals are disabled");
    None
}

pub fn build_state(config: ServerConfig, engine: Arc<dyn ScriptEngine>) -> AppState {
    let secret = resolve_secret(&config);
    AppState::new(config, secret, engine)
}

/// Parse a configured socket address.
pub fn parse_address(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|_| StartupError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

/// Periodically prune expired responses and idle rate limit buckets.
pub fn spawn_maintenance(state: AppState, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
    let every = Duration::from_secs(state.config.cache.prune_interval_secs.max(1));
    let max_idle = Duration::from_secs(state.config.rate_limit.idle_prune_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let responses = state.responses.prune();
                    let buckets = state
                        .limiter
                        .as_ref()
                        .map(|limiter| limiter.prune_idle(max_idle))
                        .unwrap_or(0);
                    if responses > 0 || buckets > 0 {
                        tracing::debug!(responses, buckets, "Pruned expired cache entries and idle buckets");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Maintenance task stopped");
    })
}
