//! cct-web library: JSON API and dashboard for the Congressional Coalition Tracker
//!
//! Handlers read the congressional store directly for listings and go
//! through [`AnalysisCache`] for every expensive report.

use axum::Router;
use cct_common::cache::AnalysisCache;
use sqlx::SqlitePool;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

/// Upstream for member portraits; `{id}_200.jpg` is appended
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://www.congress.gov/img/member";

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub cache: AnalysisCache,
    /// Congress used by endpoints without an explicit congress
    pub default_congress: u32,
    pub http: reqwest::Client,
    pub image_base_url: String,
}

impl AppState {
    pub fn new(db: SqlitePool, cache: AnalysisCache, default_congress: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            db,
            cache,
            default_congress,
            http,
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
        }
    }

    pub fn with_image_base_url(mut self, url: impl Into<String>) -> Self {
        self.image_base_url = url.into();
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    let analysis = Router::new()
        .route("/api/analysis/:congress/:chamber", get(api::get_coalition_analysis))
        .route("/api/analysis/:congress/:chamber/ideology", get(api::get_ideology_analysis))
        .route("/api/analysis/:congress/:chamber/network", get(api::get_network_analysis))
        .route("/api/analysis/:congress/:chamber/coalitions", get(api::get_coalitions_analysis))
        .route("/api/analysis/:congress/:chamber/outliers", get(api::get_outliers_analysis))
        .route("/api/analysis/:congress/:chamber/bipartisan", get(api::get_bipartisan_analysis))
        .route("/api/analysis/:congress/:chamber/complete", get(api::get_complete_analysis))
        .route("/api/analysis/:congress/:chamber/refresh", post(api::refresh_analysis))
        .route("/api/cache/clear", get(api::clear_cache).post(api::clear_cache))
        .route("/api/cache/status", get(api::cache_status));

    let legislation = Router::new()
        .route("/api/summary", get(api::get_summary))
        .route("/api/members", get(api::list_members))
        .route("/api/member/:id", get(api::get_member))
        .route("/api/member-image/:id", get(api::get_member_image))
        .route("/api/bills", get(api::list_bills))
        .route("/api/rollcalls", get(api::list_rollcalls))
        .route("/api/votes/:rollcall_id", get(api::get_votes))
        .route("/api/cosponsors/:bill_id", get(api::get_cosponsors));

    let networks = Router::new()
        .route("/api/network/cosponsorship", get(api::cosponsorship_network))
        .route("/api/network/cosponsorship/simplified", get(api::simplified_cosponsorship_network))
        .route("/api/network/member/:id", get(api::member_network))
        .route("/api/caucus/:id/network", get(api::caucus_network));

    let caucuses = Router::new()
        .route("/api/caucuses", get(api::list_caucuses))
        .route("/api/caucuses/:id", get(api::get_caucus))
        .route("/api/caucuses/:id/members", get(api::get_caucus_members))
        .route("/api/caucus-memberships", post(api::create_caucus_membership))
        .route("/api/caucus-memberships/:id", delete(api::end_caucus_membership));

    let public = Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(analysis)
        .merge(legislation)
        .merge(networks)
        .merge(caucuses)
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
