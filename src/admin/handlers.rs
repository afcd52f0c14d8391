use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::http::state::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub dev_mode: bool,
    pub uptime_secs: u64,
    pub sessions_enabled: bool,
    pub signed_literals_enabled: bool,
    pub routes: usize,
}

#[derive(Serialize)]
pub struct CacheSummary {
    pub fragments: CacheStats,
    pub fragment_hit_rate: f64,
    pub responses: CacheStats,
    pub response_hit_rate: f64,
    pub rate_limit_buckets: usize,
}

#[derive(Serialize)]
pub struct Cleared {
    pub fragments: usize,
    pub responses: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        dev_mode: state.config.dev_mode,
        uptime_secs: state.uptime().as_secs(),
        sessions_enabled: state.sessions.is_some(),
        signed_literals_enabled: state.literals.is_some(),
        routes: state.routes.len(),
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheSummary> {
    let fragments = state.fragments.stats();
    let responses = state.responses.stats();
    Json(CacheSummary {
        fragment_hit_rate: fragments.hit_rate(),
        response_hit_rate: responses.hit_rate(),
        fragments,
        responses,
        rate_limit_buckets: state.limiter.as_ref().map(|l| l.bucket_count()).unwrap_or(0),
    })
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Cleared> {
    let cleared = Cleared {
        fragments: state.fragments.len(),
        responses: state.responses.len(),
    };
    state.fragments.clear();
    state.responses.clear();
    tracing::info!(fragments = cleared.fragments, responses = cleared.responses, "Caches cleared via admin API");
    Json(cleared)
}
