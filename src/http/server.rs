//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the dispatch handler
//! - Wrap it in the configured pipeline
//! - Serve connections until shutdown is signalled

use std::net::SocketAddr;

use axum::{routing::any, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::http::handler::dispatch;
use crate::http::pipeline::Pipeline;
use crate::http::state::AppState;

/// Router with every path sent to the script engine, wrapped in the pipeline.
pub fn build_router(state: AppState) -> Router {
    let pipeline = Pipeline::from_config(&state.config);
    tracing::debug!(
        stages = ?pipeline.stages().iter().map(|s| s.name()).collect::<Vec<_>>(),
        "Request pipeline"
    );

    let router = Router::new()
        .route("/", any(dispatch))
        .route("/{*path}", any(dispatch))
        .with_state(state.clone());
    pipeline.apply(router, &state)
}

/// HTTP server for the site.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            dev_mode = self.state.config.dev_mode,
            routes = self.state.routes.len(),
            sessions = self.state.sessions.is_some(),
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
