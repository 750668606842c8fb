//! Member listing and member detail

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use cct_common::analysis::report::IdeologyEntry;
use cct_common::analysis::scores::{IdeologyProfile, VotingStats};
use cct_common::analysis::{AnalysisKind, Chamber, Party, Position, VoteCode};
use cct_common::db::caucus::{load_caucus_sets, CaucusFlags};
use cct_common::db::models::{display_name, Member};
use cct_common::text::name_sort_key;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use super::analysis::cached_report;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Recent votes listed on the member page
const RECENT_VOTES_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
pub struct MemberListing {
    pub id: String,
    pub name: String,
    pub party: Option<String>,
    pub state: Option<String>,
    pub district: Option<i64>,
    pub chamber: &'static str,
    pub vote_count: i64,
    pub cosponsor_count: i64,
    pub start_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub caucuses: CaucusFlags,
}

#[derive(Debug, sqlx::FromRow)]
struct MemberCountsRow {
    member_id_bioguide: String,
    first: Option<String>,
    last: Option<String>,
    party: Option<String>,
    state: Option<String>,
    district: Option<i64>,
    start_date: Option<NaiveDate>,
    vote_count: i64,
    cosponsor_count: i64,
}

/// GET /api/members
///
/// House members ordered by accent-insensitive last name, then first name.
pub async fn list_members(State(state): State<AppState>) -> ApiResult<Json<Vec<MemberListing>>> {
    let rows = sqlx::query_as::<_, MemberCountsRow>(
        r#"
        SELECT m.member_id_bioguide, m.first, m.last, m.party, m.state, m.district, m.start_date,
               (SELECT COUNT(*) FROM votes v WHERE v.member_id_bioguide = m.member_id_bioguide) AS vote_count,
               (SELECT COUNT(*) FROM cosponsors c WHERE c.member_id_bioguide = m.member_id_bioguide) AS cosponsor_count
        FROM members m
        WHERE m.district IS NOT NULL
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let caucuses = load_caucus_sets(&state.db).await?;

    let mut members: Vec<MemberListing> = rows
        .into_iter()
        .map(|row| MemberListing {
            caucuses: caucuses.flags_for(&row.member_id_bioguide),
            name: display_name(row.first.as_deref(), row.last.as_deref()),
            id: row.member_id_bioguide,
            party: row.party,
            state: row.state,
            district: row.district,
            chamber: "House",
            vote_count: row.vote_count,
            cosponsor_count: row.cosponsor_count,
            start_date: row.start_date,
        })
        .collect();

    members.sort_by_cached_key(|m| name_sort_key(&m.name));
    Ok(Json(members))
}

#[derive(Debug, Serialize)]
pub struct MemberDetails {
    pub id: String,
    pub name: String,
    pub first: Option<String>,
    pub last: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
    pub district: Option<i64>,
    pub chamber: &'static str,
    pub start_date: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub dc_office: Option<String>,
    #[serde(flatten)]
    pub caucuses: CaucusFlags,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SponsoredBill {
    pub bill_id: String,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub bill_type: String,
    pub number: i64,
    pub introduced_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CosponsoredBill {
    pub bill_id: String,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub bill_type: String,
    pub number: i64,
    pub introduced_date: Option<NaiveDate>,
    pub date: NaiveDate,
    pub is_original: bool,
}

#[derive(Debug, Serialize)]
pub struct RecentVote {
    pub rollcall_id: String,
    pub vote_code: String,
    pub question: Option<String>,
    pub date: NaiveDate,
    pub bill_id: Option<String>,
    pub bill_title: Option<String>,
    pub is_cross_party: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct RecentVoteRow {
    rollcall_id: String,
    vote_code: String,
    question: Option<String>,
    date: NaiveDate,
    bill_id: Option<String>,
    bill_title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member: MemberDetails,
    pub voting_stats: VotingStats,
    pub sponsored_bills: Vec<SponsoredBill>,
    pub cosponsored_bills: Vec<CosponsoredBill>,
    pub recent_votes: Vec<RecentVote>,
    pub ideological_profile: IdeologyProfile,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Whether a vote went against the majority of the voter's own party
///
/// Only decisive votes by Democrats or Republicans can cross; a tied party
/// split has no majority to cross.
pub(crate) fn is_cross_party(vote: VoteCode, party: &Party, party_votes: &[(Option<String>, String)]) -> bool {
    if !vote.is_decisive() || !party.is_major() {
        return false;
    }

    let (mut yea, mut nay) = (0u32, 0u32);
    for (raw_party, code) in party_votes {
        if Party::normalize(raw_party.as_deref()) != *party {
            continue;
        }
        match code.parse::<VoteCode>() {
            Ok(VoteCode::Yea) => yea += 1,
            Ok(VoteCode::Nay) => nay += 1,
            _ => {}
        }
    }

    match Position::from_counts(yea, nay) {
        Position::Tie => false,
        majority => !majority.matches(vote),
    }
}

async fn load_member(state: &AppState, member_id: &str) -> ApiResult<Member> {
    sqlx::query_as::<_, Member>(
        r#"
        SELECT member_id_bioguide, first, last, party, state, district, start_date,
               email, phone, website, dc_office
        FROM members WHERE member_id_bioguide = ?
        "#,
    )
    .bind(member_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Member {}", member_id)))
}

async fn recent_votes(state: &AppState, member: &Member) -> ApiResult<Vec<RecentVote>> {
    let rows = sqlx::query_as::<_, RecentVoteRow>(
        r#"
        SELECT v.rollcall_id, v.vote_code, r.question, r.date, r.bill_id, b.title AS bill_title
        FROM votes v
        JOIN rollcalls r ON r.rollcall_id = v.rollcall_id
        LEFT JOIN bills b ON b.bill_id = r.bill_id
        WHERE v.member_id_bioguide = ?
        ORDER BY r.date DESC, r.rc_number DESC
        LIMIT ?
        "#,
    )
    .bind(&member.member_id_bioguide)
    .bind(RECENT_VOTES_LIMIT)
    .fetch_all(&state.db)
    .await?;

    let party = Party::normalize(member.party.as_deref());
    let mut votes = Vec::with_capacity(rows.len());
    for row in rows {
        let cross = match row.vote_code.parse::<VoteCode>() {
            Ok(vote) if vote.is_decisive() && party.is_major() => {
                let party_votes: Vec<(Option<String>, String)> = sqlx::query_as(
                    r#"
                    SELECT m.party, v.vote_code
                    FROM votes v
                    JOIN members m ON m.member_id_bioguide = v.member_id_bioguide
                    WHERE v.rollcall_id = ? AND m.district IS NOT NULL
                    "#,
                )
                .bind(&row.rollcall_id)
                .fetch_all(&state.db)
                .await?;
                is_cross_party(vote, &party, &party_votes)
            }
            _ => false,
        };

        votes.push(RecentVote {
            rollcall_id: row.rollcall_id,
            vote_code: row.vote_code,
            question: row.question,
            date: row.date,
            bill_id: row.bill_id,
            bill_title: row.bill_title,
            is_cross_party: cross,
        });
    }
    Ok(votes)
}

/// Profile from the cached House ideology report of the default congress
async fn ideological_profile(state: &AppState, member_id: &str) -> IdeologyProfile {
    let entry = match cached_report(state, AnalysisKind::Ideology, state.default_congress, Chamber::House).await {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Ideology report unavailable for member page: {}", e);
            return IdeologyProfile::not_found();
        }
    };

    entry
        .payload
        .get("profiles")
        .and_then(|profiles| profiles.get(member_id))
        .and_then(|value| serde_json::from_value::<IdeologyEntry>(value.clone()).ok())
        .map(|entry| entry.profile)
        .unwrap_or_else(IdeologyProfile::not_found)
}

/// GET /api/member/:id
pub async fn get_member(
    State(state): State<AppState>,
    WithRejection(Path(member_id), _): WithRejection<Path<String>, ApiError>,
) -> ApiResult<Json<MemberResponse>> {
    let member = load_member(&state, &member_id).await?;
    let caucuses = load_caucus_sets(&state.db).await?;

    let codes: Vec<String> = sqlx::query_scalar("SELECT vote_code FROM votes WHERE member_id_bioguide = ?")
        .bind(&member_id)
        .fetch_all(&state.db)
        .await?;
    let mut voting_stats = VotingStats::from_votes(codes.iter().filter_map(|c| c.parse::<VoteCode>().ok()));
    voting_stats.yea_percentage = round1(voting_stats.yea_percentage);
    voting_stats.nay_percentage = round1(voting_stats.nay_percentage);

    let sponsored_bills = sqlx::query_as::<_, SponsoredBill>(
        r#"
        SELECT bill_id, title, UPPER(type) AS bill_type, number, introduced_date
        FROM bills WHERE sponsor_bioguide = ?
        ORDER BY introduced_date DESC
        "#,
    )
    .bind(&member_id)
    .fetch_all(&state.db)
    .await?;

    let cosponsored_bills = sqlx::query_as::<_, CosponsoredBill>(
        r#"
        SELECT b.bill_id, b.title, UPPER(b.type) AS bill_type, b.number, b.introduced_date,
               c.date, c.is_original
        FROM cosponsors c
        JOIN bills b ON b.bill_id = c.bill_id
        WHERE c.member_id_bioguide = ?
        ORDER BY c.date DESC
        "#,
    )
    .bind(&member_id)
    .fetch_all(&state.db)
    .await?;

    let recent_votes = recent_votes(&state, &member).await?;
    let ideological_profile = ideological_profile(&state, &member_id).await;

    let details = MemberDetails {
        name: member.display_name(),
        chamber: member.chamber_title(),
        caucuses: caucuses.flags_for(&member.member_id_bioguide),
        id: member.member_id_bioguide,
        first: member.first,
        last: member.last,
        party: member.party,
        state: member.state,
        district: member.district,
        start_date: member.start_date,
        email: member.email,
        phone: member.phone,
        website: member.website,
        dc_office: member.dc_office,
    };

    Ok(Json(MemberResponse {
        member: details,
        voting_stats,
        sponsored_bills,
        cosponsored_bills,
        recent_votes,
        ideological_profile,
    }))
}
