//! Caucus listings and membership management
//!
//! Starting or ending a membership changes the caucus data some cached
//! reports embed, so both invalidate those cache entries.

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use cct_common::db::caucus::{self, CaucusSummary};
use cct_common::db::models::{display_name, CaucusMembership};
use cct_common::text::name_sort_key;
use cct_common::time::today;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/caucuses
pub async fn list_caucuses(State(state): State<AppState>) -> ApiResult<Json<Vec<CaucusSummary>>> {
    Ok(Json(caucus::list_caucuses(&state.db).await?))
}

/// GET /api/caucuses/:id
pub async fn get_caucus(
    State(state): State<AppState>,
    WithRejection(Path(caucus_id), _): WithRejection<Path<i64>, ApiError>,
) -> ApiResult<Json<CaucusSummary>> {
    caucus::caucus_summary(&state.db, caucus_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Caucus {}", caucus_id)))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CaucusMemberListing {
    pub id: i64,
    pub member_id_bioguide: String,
    #[sqlx(skip)]
    pub member_name: String,
    #[serde(skip)]
    pub first: Option<String>,
    #[serde(skip)]
    pub last: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
    pub district: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// GET /api/caucuses/:id/members
///
/// Active memberships sorted by accent-insensitive last, then first name.
pub async fn get_caucus_members(
    State(state): State<AppState>,
    WithRejection(Path(caucus_id), _): WithRejection<Path<i64>, ApiError>,
) -> ApiResult<Json<Vec<CaucusMemberListing>>> {
    let mut members = sqlx::query_as::<_, CaucusMemberListing>(
        r#"
        SELECT cm.id, cm.member_id_bioguide, m.first, m.last, m.party, m.state, m.district,
               cm.start_date, cm.notes
        FROM caucus_memberships cm
        JOIN members m ON m.member_id_bioguide = cm.member_id_bioguide
        WHERE cm.caucus_id = ? AND cm.end_date IS NULL
        "#,
    )
    .bind(caucus_id)
    .fetch_all(&state.db)
    .await?;

    for member in &mut members {
        member.member_name = display_name(member.first.as_deref(), member.last.as_deref());
    }
    members.sort_by_cached_key(|m| name_sort_key(&m.member_name));

    Ok(Json(members))
}

#[derive(Debug, Deserialize)]
pub struct CreateMembershipRequest {
    pub member_id_bioguide: Option<String>,
    pub caucus_id: Option<i64>,
    /// YYYY-MM-DD
    pub start_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership: Option<CaucusMembership>,
}

async fn invalidate_caucus_reports(state: &AppState) {
    match state.cache.invalidate_caucus_dependent().await {
        Ok(0) => {}
        Ok(n) => info!("Invalidated {} caucus-dependent cache entries", n),
        Err(e) => warn!("Failed to invalidate caucus-dependent cache entries: {}", e),
    }
}

/// POST /api/caucus-memberships
pub async fn create_caucus_membership(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateMembershipRequest>, ApiError>,
) -> ApiResult<Json<MembershipResponse>> {
    let (member_id, caucus_id) = match (request.member_id_bioguide.as_deref(), request.caucus_id) {
        (Some(member_id), Some(caucus_id)) if !member_id.trim().is_empty() => (member_id.trim(), caucus_id),
        _ => {
            return Err(ApiError::BadRequest(
                "Missing required fields: member_id_bioguide, caucus_id".to_string(),
            ))
        }
    };

    let start_date = request
        .start_date
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .map_err(|_| ApiError::BadRequest("start_date must be YYYY-MM-DD".to_string()))?;

    let member_exists: Option<String> =
        sqlx::query_scalar("SELECT member_id_bioguide FROM members WHERE member_id_bioguide = ?")
            .bind(member_id)
            .fetch_optional(&state.db)
            .await?;
    if member_exists.is_none() {
        return Err(ApiError::NotFound(format!("Member {}", member_id)));
    }
    if caucus::get_caucus(&state.db, caucus_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Caucus {}", caucus_id)));
    }

    let id = caucus::create_membership(&state.db, member_id, caucus_id, start_date, request.notes.as_deref()).await?;
    info!("Added {} to caucus {} (membership {})", member_id, caucus_id, id);
    invalidate_caucus_reports(&state).await;

    Ok(Json(MembershipResponse {
        message: "Membership created successfully".to_string(),
        id: Some(id),
        membership: None,
    }))
}

/// DELETE /api/caucus-memberships/:id
///
/// Ends the membership as of today; the row is kept.
pub async fn end_caucus_membership(
    State(state): State<AppState>,
    WithRejection(Path(membership_id), _): WithRejection<Path<i64>, ApiError>,
) -> ApiResult<Json<MembershipResponse>> {
    let membership = caucus::end_membership(&state.db, membership_id, today()).await?;
    info!(
        "Ended {}'s membership in caucus {} ({})",
        membership.member_id_bioguide, membership.caucus_id, membership_id
    );
    invalidate_caucus_reports(&state).await;

    Ok(Json(MembershipResponse {
        message: "Membership ended successfully".to_string(),
        id: Some(membership.id),
        membership: Some(membership),
    }))
}
