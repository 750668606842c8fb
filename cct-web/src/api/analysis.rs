//! Cached analysis reports, forced refresh and cache administration
//!
//! Reports are served from the persistent cache when fresh and computed on
//! demand otherwise. Each response carries `cached` and `computed_at`, plus
//! `cache_retrieved_at` for hits or `generated_at` for fresh computations.

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use cct_common::analysis::{self, AnalysisKind, Chamber};
use cct_common::cache::{CacheEntryStatus, CacheKey, CachedAnalysis};
use cct_common::refresh::{RefreshReport, Refresher};
use cct_common::time::{convened_congress_start, now, today};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Validate the `{congress}/{chamber}` path segments
///
/// The congress must have convened by `today`.
pub(crate) fn parse_target(congress: &str, chamber: &str, today: NaiveDate) -> ApiResult<(u32, Chamber)> {
    let congress = congress
        .parse::<u32>()
        .ok()
        .filter(|c| *c > 0)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid congress '{}'", congress)))?;
    convened_congress_start(congress, today)?;
    let chamber = chamber
        .parse::<Chamber>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok((congress, chamber))
}

/// Attach cache metadata to a report object
pub(crate) fn decorate(entry: CachedAnalysis) -> Value {
    let mut payload = entry.payload;
    if let Value::Object(map) = &mut payload {
        map.insert("cached".to_string(), json!(entry.cached));
        map.insert("computed_at".to_string(), json!(entry.computed_at));
        let stamp = if entry.cached { "cache_retrieved_at" } else { "generated_at" };
        map.insert(stamp.to_string(), json!(now()));
    }
    payload
}

/// Serve one report through the cache
pub(crate) async fn cached_report(
    state: &AppState,
    kind: AnalysisKind,
    congress: u32,
    chamber: Chamber,
) -> ApiResult<CachedAnalysis> {
    let key = CacheKey::new(kind, congress, chamber);
    let pool = state.db.clone();
    let entry = state
        .cache
        .get_or_compute(&key, state.cache.ttl_for(kind), || async move {
            analysis::compute(&pool, kind, congress, chamber, today()).await
        })
        .await?;

    if entry.cached {
        info!("Serving cached {}", key);
    } else {
        info!("Computed fresh {}", key);
    }
    Ok(entry)
}

async fn serve(state: AppState, kind: AnalysisKind, congress: String, chamber: String) -> ApiResult<Json<Value>> {
    let (congress, chamber) = parse_target(&congress, &chamber, today())?;
    let entry = cached_report(&state, kind, congress, chamber).await?;
    Ok(Json(decorate(entry)))
}

/// GET /api/analysis/:congress/:chamber
pub async fn get_coalition_analysis(
    State(state): State<AppState>,
    WithRejection(Path((congress, chamber)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> ApiResult<Json<Value>> {
    serve(state, AnalysisKind::Coalition, congress, chamber).await
}

/// GET /api/analysis/:congress/:chamber/ideology
pub async fn get_ideology_analysis(
    State(state): State<AppState>,
    WithRejection(Path((congress, chamber)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> ApiResult<Json<Value>> {
    serve(state, AnalysisKind::Ideology, congress, chamber).await
}

/// GET /api/analysis/:congress/:chamber/network
pub async fn get_network_analysis(
    State(state): State<AppState>,
    WithRejection(Path((congress, chamber)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> ApiResult<Json<Value>> {
    serve(state, AnalysisKind::Network, congress, chamber).await
}

/// GET /api/analysis/:congress/:chamber/coalitions
pub async fn get_coalitions_analysis(
    State(state): State<AppState>,
    WithRejection(Path((congress, chamber)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> ApiResult<Json<Value>> {
    serve(state, AnalysisKind::Coalitions, congress, chamber).await
}

/// GET /api/analysis/:congress/:chamber/outliers
pub async fn get_outliers_analysis(
    State(state): State<AppState>,
    WithRejection(Path((congress, chamber)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> ApiResult<Json<Value>> {
    serve(state, AnalysisKind::Outliers, congress, chamber).await
}

/// GET /api/analysis/:congress/:chamber/bipartisan
pub async fn get_bipartisan_analysis(
    State(state): State<AppState>,
    WithRejection(Path((congress, chamber)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> ApiResult<Json<Value>> {
    serve(state, AnalysisKind::Hotspots, congress, chamber).await
}

/// GET /api/analysis/:congress/:chamber/complete
pub async fn get_complete_analysis(
    State(state): State<AppState>,
    WithRejection(Path((congress, chamber)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> ApiResult<Json<Value>> {
    serve(state, AnalysisKind::Complete, congress, chamber).await
}

/// POST /api/analysis/:congress/:chamber/refresh
///
/// Recomputes every report for the target and replaces the cache entries.
pub async fn refresh_analysis(
    State(state): State<AppState>,
    WithRejection(Path((congress, chamber)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> ApiResult<Json<RefreshReport>> {
    let (congress, chamber) = parse_target(&congress, &chamber, today())?;
    let refresher = Refresher::new(state.db.clone(), state.cache.clone());
    let report = refresher.refresh_target(congress, chamber).await;

    if report.succeeded() {
        Ok(Json(report))
    } else {
        let failures: Vec<String> = report
            .failures()
            .map(|o| format!("{}: {}", o.kind, o.error.as_deref().unwrap_or("unknown error")))
            .collect();
        Err(ApiError::Internal(format!("Refresh failed: {}", failures.join("; "))))
    }
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub message: String,
    pub removed: u64,
}

/// GET|POST /api/cache/clear
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<ClearCacheResponse>> {
    let removed = state.cache.clear().await?;
    Ok(Json(ClearCacheResponse {
        message: "Cache cleared successfully".to_string(),
        removed,
    }))
}

#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    pub total: usize,
    pub expired: usize,
    pub entries: Vec<CacheEntryStatus>,
}

/// GET /api/cache/status
pub async fn cache_status(State(state): State<AppState>) -> ApiResult<Json<CacheStatusResponse>> {
    let entries = state.cache.entries().await?;
    Ok(Json(CacheStatusResponse {
        total: entries.len(),
        expired: entries.iter().filter(|e| e.expired).count(),
        entries,
    }))
}
