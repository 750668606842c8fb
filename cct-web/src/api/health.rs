//! Liveness and readiness
//!
//! `/health` answers 200 while the store is reachable and 503 otherwise, and
//! reports how many analysis reports are currently cached.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub default_congress: u32,
    /// Unexpired cache entries; absent when the store is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_reports: Option<usize>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let reachable = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db).await;
    let cached_reports = match &reachable {
        Ok(_) => match state.cache.entries().await {
            Ok(entries) => Some(entries.iter().filter(|e| !e.expired).count()),
            Err(e) => {
                warn!("Health check could not list cache entries: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Health check could not reach the database: {}", e);
            None
        }
    };

    let healthy = reachable.is_ok();
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "unavailable" },
            module: "cct-web",
            version: env!("CARGO_PKG_VERSION"),
            database: if healthy { "ok" } else { "unreachable" },
            default_congress: state.default_congress,
            cached_reports,
        }),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
