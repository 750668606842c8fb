//! Dashboard summary counts

use axum::{extract::State, Json};
use cct_common::time::{convened_congress_start, today};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TimePeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_covered: i64,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub congress: u32,
    pub house_members: i64,
    pub house_bills: i64,
    pub house_rollcalls: i64,
    pub house_votes: i64,
    pub house_cosponsorships: i64,
    pub house_party_breakdown: BTreeMap<String, i64>,
    pub time_period: TimePeriod,
    pub note: String,
}

/// English ordinal suffix ("119th", "121st")
fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn time_period(congress: u32, start_date: NaiveDate, end_date: NaiveDate) -> TimePeriod {
    TimePeriod {
        start_date,
        end_date,
        days_covered: (end_date - start_date).num_days() + 1,
        description: format!(
            "{} Congress (since {})",
            ordinal(congress),
            start_date.format("%B %d, %Y")
        ),
    }
}

/// GET /api/summary
///
/// House activity since the start of the default congress.
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<SummaryResponse>> {
    let congress = state.default_congress;
    let end = today();
    let start = convened_congress_start(congress, end)?;
    let pool = &state.db;

    let house_members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE district IS NOT NULL")
        .fetch_one(pool)
        .await?;

    let house_bills: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bills WHERE chamber = 'house' AND introduced_date >= ?",
    )
    .bind(start)
    .fetch_one(pool)
    .await?;

    let house_rollcalls: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM rollcalls WHERE chamber = 'house' AND date >= ?")
            .bind(start)
            .fetch_one(pool)
            .await?;

    let house_votes: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM votes v
        JOIN rollcalls r ON r.rollcall_id = v.rollcall_id
        WHERE r.chamber = 'house' AND r.date >= ?
        "#,
    )
    .bind(start)
    .fetch_one(pool)
    .await?;

    let house_cosponsorships: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM cosponsors c
        JOIN bills b ON b.bill_id = c.bill_id
        WHERE b.chamber = 'house' AND b.introduced_date >= ?
        "#,
    )
    .bind(start)
    .fetch_one(pool)
    .await?;

    let breakdown: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT COALESCE(party, 'Unknown') AS party, COUNT(*)
        FROM members WHERE district IS NOT NULL
        GROUP BY COALESCE(party, 'Unknown')
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(Json(SummaryResponse {
        congress,
        house_members,
        house_bills,
        house_rollcalls,
        house_votes,
        house_cosponsorships,
        house_party_breakdown: breakdown.into_iter().collect(),
        time_period: time_period(congress, start, end),
        note: format!("Counts cover House activity in the {} Congress only", ordinal(congress)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(119), "119th");
        assert_eq!(ordinal(121), "121st");
        assert_eq!(ordinal(112), "112th");
        assert_eq!(ordinal(102), "102nd");
    }

    #[test]
    fn test_time_period_counts_both_ends() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 4).unwrap();
        let period = time_period(119, start, end);
        assert_eq!(period.start_date, NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
        assert_eq!(period.days_covered, 2);
        assert_eq!(period.description, "119th Congress (since January 03, 2025)");
    }
}
