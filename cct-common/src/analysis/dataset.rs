//! Vote dataset loading
//!
//! Every analysis pass runs over a [`VoteDataset`]: the chamber's members,
//! the roll calls inside an [`AnalysisWindow`], and a roll call → member →
//! vote matrix. Maps are `BTreeMap`s so report ordering is stable between
//! refreshes.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::types::{Chamber, Party, VoteCode};
use crate::db::models::display_name;
use crate::time::convened_congress_start;
use crate::{Error, Result};

/// Shortest window an analysis covers, even early in a congress
pub const MIN_WINDOW_DAYS: i64 = 30;

/// Number of bills listed under "recent bills"
pub const RECENT_BILLS_LIMIT: i64 = 10;

/// Inclusive date range of roll calls considered by an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AnalysisWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window covering the congress so far, never shorter than 30 days
    ///
    /// Fails for congresses that have not convened by `today`.
    pub fn for_congress(congress: u32, today: NaiveDate) -> Result<Self> {
        let convened = convened_congress_start(congress, today)?;
        let days = ((today - convened).num_days() + 1).max(MIN_WINDOW_DAYS);
        let start = today
            .checked_sub_signed(Duration::days(days))
            .ok_or_else(|| Error::InvalidInput(format!("Analysis window for congress {} is out of range", congress)))?;
        Ok(Self { start, end: today })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Member of the analysed chamber
#[derive(Debug, Clone, Serialize)]
pub struct MemberInfo {
    pub id: String,
    pub name: String,
    pub party: Party,
    pub state: Option<String>,
    pub district: Option<i64>,
}

/// Roll call inside the window, with its bill title when linked
#[derive(Debug, Clone, Serialize)]
pub struct RollcallInfo {
    pub rollcall_id: String,
    pub rc_number: i64,
    pub date: NaiveDate,
    pub question: Option<String>,
    pub bill_id: Option<String>,
    pub bill_title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentBill {
    pub bill_id: String,
    pub title: Option<String>,
    pub introduced_date: Option<NaiveDate>,
    pub sponsor_bioguide: Option<String>,
}

/// Members, roll calls and votes for one (congress, chamber, window)
#[derive(Debug, Clone)]
pub struct VoteDataset {
    pub congress: u32,
    pub chamber: Chamber,
    pub window: AnalysisWindow,
    pub members: BTreeMap<String, MemberInfo>,
    pub rollcalls: BTreeMap<String, RollcallInfo>,
    /// rollcall_id → member_id → vote
    pub votes: BTreeMap<String, BTreeMap<String, VoteCode>>,
    pub recent_bills: Vec<RecentBill>,
}

type MemberRow = (String, Option<String>, Option<String>, Option<String>, Option<String>, Option<i64>);
type RollcallRow = (String, i64, NaiveDate, Option<String>, Option<String>, Option<String>);

impl VoteDataset {
    pub fn empty(congress: u32, chamber: Chamber, window: AnalysisWindow) -> Self {
        Self {
            congress,
            chamber,
            window,
            members: BTreeMap::new(),
            rollcalls: BTreeMap::new(),
            votes: BTreeMap::new(),
            recent_bills: Vec::new(),
        }
    }

    /// Load the dataset from the store
    pub async fn load(
        pool: &SqlitePool,
        congress: u32,
        chamber: Chamber,
        window: AnalysisWindow,
    ) -> Result<Self> {
        let mut dataset = Self::empty(congress, chamber, window);

        let members_sql = format!(
            "SELECT member_id_bioguide, first, last, party, state, district FROM members WHERE {} ORDER BY member_id_bioguide",
            chamber.member_predicate()
        );
        let members: Vec<MemberRow> = sqlx::query_as(&members_sql).fetch_all(pool).await?;
        for (id, first, last, party, state, district) in members {
            dataset.insert_member(MemberInfo {
                name: display_name(first.as_deref(), last.as_deref()),
                party: Party::normalize(party.as_deref()),
                id,
                state,
                district,
            });
        }

        let rollcalls: Vec<RollcallRow> = sqlx::query_as(
            r#"
            SELECT r.rollcall_id, r.rc_number, r.date, r.question, r.bill_id, b.title
            FROM rollcalls r
            LEFT JOIN bills b ON b.bill_id = r.bill_id
            WHERE r.congress = ? AND r.chamber = ? AND r.date >= ? AND r.date <= ?
            ORDER BY r.date, r.rollcall_id
            "#,
        )
        .bind(congress as i64)
        .bind(chamber.as_str())
        .bind(window.start)
        .bind(window.end)
        .fetch_all(pool)
        .await?;
        for (rollcall_id, rc_number, date, question, bill_id, bill_title) in rollcalls {
            dataset.insert_rollcall(RollcallInfo {
                rollcall_id,
                rc_number,
                date,
                question,
                bill_id,
                bill_title,
            });
        }

        let votes: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT v.rollcall_id, v.member_id_bioguide, v.vote_code
            FROM votes v
            JOIN rollcalls r ON r.rollcall_id = v.rollcall_id
            WHERE r.congress = ? AND r.chamber = ? AND r.date >= ? AND r.date <= ?
            "#,
        )
        .bind(congress as i64)
        .bind(chamber.as_str())
        .bind(window.start)
        .bind(window.end)
        .fetch_all(pool)
        .await?;
        for (rollcall_id, member_id, code) in votes {
            match code.parse::<VoteCode>() {
                Ok(vote) => dataset.record_vote(&rollcall_id, &member_id, vote),
                Err(e) => warn!("Skipping vote {}/{}: {}", rollcall_id, member_id, e),
            }
        }

        dataset.recent_bills = sqlx::query_as::<_, (String, Option<String>, Option<NaiveDate>, Option<String>)>(
            r#"
            SELECT bill_id, title, introduced_date, sponsor_bioguide
            FROM bills
            WHERE congress = ? AND chamber = ? AND introduced_date >= ?
            ORDER BY introduced_date DESC, bill_id
            LIMIT ?
            "#,
        )
        .bind(congress as i64)
        .bind(chamber.as_str())
        .bind(window.start)
        .bind(RECENT_BILLS_LIMIT)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|(bill_id, title, introduced_date, sponsor_bioguide)| RecentBill {
            bill_id,
            title,
            introduced_date,
            sponsor_bioguide,
        })
        .collect();

        debug!(
            "Loaded dataset {} {}: {} members, {} roll calls, {} votes",
            congress,
            chamber,
            dataset.members.len(),
            dataset.rollcalls.len(),
            dataset.vote_count()
        );

        Ok(dataset)
    }

    pub fn insert_member(&mut self, member: MemberInfo) {
        self.members.insert(member.id.clone(), member);
    }

    pub fn insert_rollcall(&mut self, rollcall: RollcallInfo) {
        self.votes.entry(rollcall.rollcall_id.clone()).or_default();
        self.rollcalls.insert(rollcall.rollcall_id.clone(), rollcall);
    }

    pub fn record_vote(&mut self, rollcall_id: &str, member_id: &str, vote: VoteCode) {
        self.votes
            .entry(rollcall_id.to_string())
            .or_default()
            .insert(member_id.to_string(), vote);
    }

    /// Party of a chamber member; `None` for votes cast by non-members
    pub fn party_of(&self, member_id: &str) -> Option<&Party> {
        self.members.get(member_id).map(|m| &m.party)
    }

    /// Total recorded votes across all roll calls
    pub fn vote_count(&self) -> usize {
        self.votes.values().map(BTreeMap::len).sum()
    }

    /// A member's votes, in roll call id order
    pub fn member_votes<'a>(&'a self, member_id: &'a str) -> impl Iterator<Item = (&'a str, VoteCode)> + 'a {
        self.votes.iter().filter_map(move |(rollcall_id, votes)| {
            votes.get(member_id).map(|vote| (rollcall_id.as_str(), *vote))
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::db::init::init_memory_database;

    #[test]
    fn test_window_covers_congress_so_far() {
        let window = AnalysisWindow::for_congress(119, date(2025, 3, 3)).unwrap();
        // Jan 3 through Mar 3 inclusive is 60 days
        assert_eq!(window.days(), 60);
        assert_eq!(window.end, date(2025, 3, 3));
    }

    #[test]
    fn test_window_has_minimum_length() {
        let window = AnalysisWindow::for_congress(119, date(2025, 1, 5)).unwrap();
        assert_eq!(window.days(), MIN_WINDOW_DAYS);
        assert!(window.contains(date(2024, 12, 20)));
        assert!(!window.contains(date(2025, 1, 6)));
    }

    #[test]
    fn test_window_rejects_unconvened_congress() {
        assert!(matches!(
            AnalysisWindow::for_congress(200_000, date(2025, 3, 3)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            AnalysisWindow::for_congress(120, date(2025, 3, 3)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_load_filters_by_chamber_and_window() {
        let pool = init_memory_database().await.unwrap();
        execute_script(
            &pool,
            r#"
            INSERT INTO members (member_id_bioguide, first, last, party, state, district) VALUES
                ('H1', 'Ann', 'House', 'D', 'CA', 1),
                ('S1', 'Sam', 'Senate', 'R', 'TX', NULL);
            INSERT INTO rollcalls (rollcall_id, congress, chamber, session, rc_number, date, question) VALUES
                ('rc-in', 119, 'house', 1, 1, '2025-02-01', 'On Passage'),
                ('rc-old', 119, 'house', 1, 2, '2024-06-01', 'On Passage'),
                ('rc-senate', 119, 'senate', 1, 1, '2025-02-01', 'On Cloture');
            INSERT INTO votes (rollcall_id, member_id_bioguide, vote_code) VALUES
                ('rc-in', 'H1', 'Yea'),
                ('rc-old', 'H1', 'Nay'),
                ('rc-senate', 'S1', 'Nay');
            "#,
        )
        .await;

        let window = AnalysisWindow::new(date(2025, 1, 3), date(2025, 3, 1));
        let dataset = VoteDataset::load(&pool, 119, Chamber::House, window).await.unwrap();

        assert_eq!(dataset.members.len(), 1);
        assert_eq!(dataset.members["H1"].name, "Ann House");
        assert_eq!(dataset.rollcalls.len(), 1);
        assert_eq!(dataset.vote_count(), 1);
        assert_eq!(dataset.member_votes("H1").collect::<Vec<_>>(), vec![("rc-in", VoteCode::Yea)]);
    }
}
