//! Bills, roll calls, votes and cosponsors

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use cct_common::analysis::{AnalysisKind, Chamber};
use cct_common::db::models::display_name;
use cct_common::text::name_sort_key;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use super::analysis::{cached_report, decorate};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/bills
///
/// House bills of the default congress, served through the cache.
pub async fn list_bills(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let entry = cached_report(&state, AnalysisKind::Bills, state.default_congress, Chamber::House).await?;
    Ok(Json(decorate(entry)))
}

#[derive(Debug, Serialize)]
pub struct RollcallListing {
    pub id: String,
    pub congress: i64,
    pub chamber: String,
    pub session: i64,
    pub rc_number: i64,
    pub question: Option<String>,
    pub bill_id: Option<String>,
    pub bill_title: Option<String>,
    pub date: NaiveDate,
    pub yea_count: i64,
    pub nay_count: i64,
    pub present_count: i64,
    pub total_votes: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct RollcallRow {
    rollcall_id: String,
    congress: i64,
    chamber: String,
    session: i64,
    rc_number: i64,
    question: Option<String>,
    bill_id: Option<String>,
    bill_title: Option<String>,
    date: NaiveDate,
    yea_count: i64,
    nay_count: i64,
    present_count: i64,
}

/// GET /api/rollcalls
pub async fn list_rollcalls(State(state): State<AppState>) -> ApiResult<Json<Vec<RollcallListing>>> {
    let rows = sqlx::query_as::<_, RollcallRow>(
        r#"
        SELECT r.rollcall_id, r.congress, r.chamber, r.session, r.rc_number, r.question,
               r.bill_id, b.title AS bill_title, r.date,
               COALESCE(SUM(CASE WHEN v.vote_code = 'Yea' THEN 1 ELSE 0 END), 0) AS yea_count,
               COALESCE(SUM(CASE WHEN v.vote_code = 'Nay' THEN 1 ELSE 0 END), 0) AS nay_count,
               COALESCE(SUM(CASE WHEN v.vote_code = 'Present' THEN 1 ELSE 0 END), 0) AS present_count
        FROM rollcalls r
        LEFT JOIN bills b ON b.bill_id = r.bill_id
        LEFT JOIN votes v ON v.rollcall_id = r.rollcall_id
        WHERE r.congress = ? AND r.chamber = 'house'
        GROUP BY r.rollcall_id
        ORDER BY r.date DESC, r.rc_number DESC
        "#,
    )
    .bind(state.default_congress as i64)
    .fetch_all(&state.db)
    .await?;

    let rollcalls = rows
        .into_iter()
        .map(|row| {
            let chamber = row
                .chamber
                .parse::<Chamber>()
                .map(|c| c.title().to_string())
                .unwrap_or(row.chamber);
            RollcallListing {
                id: row.rollcall_id,
                congress: row.congress,
                chamber,
                session: row.session,
                rc_number: row.rc_number,
                question: row.question,
                bill_id: row.bill_id,
                bill_title: row.bill_title,
                date: row.date,
                yea_count: row.yea_count,
                nay_count: row.nay_count,
                present_count: row.present_count,
                total_votes: row.yea_count + row.nay_count + row.present_count,
            }
        })
        .collect();

    Ok(Json(rollcalls))
}

#[derive(Debug, Serialize)]
pub struct VoteListing {
    pub member_id: String,
    pub member_name: String,
    pub party: Option<String>,
    pub state: Option<String>,
    pub vote_code: String,
}

/// GET /api/votes/:rollcall_id
pub async fn get_votes(
    State(state): State<AppState>,
    WithRejection(Path(rollcall_id), _): WithRejection<Path<String>, ApiError>,
) -> ApiResult<Json<Vec<VoteListing>>> {
    let exists: Option<String> = sqlx::query_scalar("SELECT rollcall_id FROM rollcalls WHERE rollcall_id = ?")
        .bind(&rollcall_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound(format!("Roll call {}", rollcall_id)));
    }

    let rows: Vec<(String, Option<String>, Option<String>, Option<String>, Option<String>, String)> =
        sqlx::query_as(
            r#"
            SELECT v.member_id_bioguide, m.first, m.last, m.party, m.state, v.vote_code
            FROM votes v
            JOIN members m ON m.member_id_bioguide = v.member_id_bioguide
            WHERE v.rollcall_id = ?
            "#,
        )
        .bind(&rollcall_id)
        .fetch_all(&state.db)
        .await?;

    let mut votes: Vec<VoteListing> = rows
        .into_iter()
        .map(|(member_id, first, last, party, state, vote_code)| VoteListing {
            member_name: display_name(first.as_deref(), last.as_deref()),
            member_id,
            party,
            state,
            vote_code,
        })
        .collect();
    votes.sort_by_cached_key(|v| name_sort_key(&v.member_name));

    Ok(Json(votes))
}

#[derive(Debug, Serialize)]
pub struct CosponsorListing {
    pub member_id: String,
    pub member_name: String,
    pub party: Option<String>,
    pub state: Option<String>,
    pub date: NaiveDate,
    pub is_original: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct CosponsorRow {
    member_id_bioguide: String,
    first: Option<String>,
    last: Option<String>,
    party: Option<String>,
    state: Option<String>,
    date: NaiveDate,
    is_original: bool,
}

/// GET /api/cosponsors/:bill_id
pub async fn get_cosponsors(
    State(state): State<AppState>,
    WithRejection(Path(bill_id), _): WithRejection<Path<String>, ApiError>,
) -> ApiResult<Json<Vec<CosponsorListing>>> {
    let exists: Option<String> = sqlx::query_scalar("SELECT bill_id FROM bills WHERE bill_id = ?")
        .bind(&bill_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound(format!("Bill {}", bill_id)));
    }

    let rows = sqlx::query_as::<_, CosponsorRow>(
        r#"
        SELECT c.member_id_bioguide, m.first, m.last, m.party, m.state, c.date, c.is_original
        FROM cosponsors c
        JOIN members m ON m.member_id_bioguide = c.member_id_bioguide
        WHERE c.bill_id = ?
        ORDER BY c.date, c.id
        "#,
    )
    .bind(&bill_id)
    .fetch_all(&state.db)
    .await?;

    let cosponsors = rows
        .into_iter()
        .map(|row| CosponsorListing {
            member_name: display_name(row.first.as_deref(), row.last.as_deref()),
            member_id: row.member_id_bioguide,
            party: row.party,
            state: row.state,
            date: row.date,
            is_original: row.is_original,
        })
        .collect();

    Ok(Json(cosponsors))
}
