//! webguard server binary.
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                      WEBGUARD                        │
//!   Client         │  ┌───────────────────┐    ┌────────────────────────┐ │
//!   ───────────────┼─▶│ pipeline          │───▶│ dispatch               │ │
//!                  │  │ compression       │    │  decode props (PLN)    │ │
//!                  │  │ request id, trace │    │  ScriptEngine          │ │
//!                  │  │ timeout, headers  │    └────────────────────────┘ │
//!                  │  │ client ip, route  │                               │
//!                  │  │ rate limit, csrf  │    ┌────────────────────────┐ │
//!                  │  │ session, cache    │    │ admin API (separate    │ │
//!                  │  └───────────────────┘    │ listener, bearer auth) │ │
//!                  │                           └────────────────────────┘ │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use webguard::admin::setup_admin_router;
use webguard::demo::DemoEngine;
use webguard::http::HttpServer;
use webguard::lifecycle::startup::parse_address;
use webguard::lifecycle::{build_state, prepare_config, shutdown_signal, spawn_maintenance, Shutdown, StartupError};
use webguard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "webguard", version, about = "Security and caching front end for server-rendered sites")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "WEBGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Force development mode
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let cli = Cli::parse();
    let config = prepare_config(cli.config.as_deref(), cli.dev)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webguard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        dev_mode = config.dev_mode,
        routes = config.routes.len(),
        rate_limit = config.rate_limit.enabled,
        csrf = config.csrf.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = parse_address("observability.metrics_address", &config.observability.metrics_address)?;
        metrics::init_metrics(addr)?;
    }

    let bind_address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let state = build_state(config, Arc::new(DemoEngine::new()));
    let shutdown = Shutdown::new();
    let maintenance = spawn_maintenance(state.clone(), shutdown.subscribe());

    let admin = if state.config.admin.enabled {
        let address = state.config.admin.bind_address.clone();
        let admin_listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind {
                address: address.clone(),
                source,
            })?;
        tracing::info!(address = %address, "Admin API listening");

        let router = setup_admin_router(state.clone());
        let mut rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            let result = axum::serve(admin_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    let server = HttpServer::new(state);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();

    match server_task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
    }
    if let Some(admin) = admin {
        let _ = admin.await;
    }
    let _ = maintenance.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
