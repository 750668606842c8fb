//! Bills drawing cosponsors from more than one party

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet};

use super::coalitions::SubjectCount;
use super::dataset::AnalysisWindow;
use super::types::{Chamber, Party};
use crate::Result;

/// Bills with fewer cosponsors are not considered
pub const MIN_COSPONSORS: usize = 5;

/// Score denominator: D, R and independents
const PARTY_SPAN: f64 = 3.0;

pub const TOP_HOTSPOT_BILLS: usize = 20;
pub const TOP_HOTSPOT_SUBJECTS: usize = 10;

/// Bill introduced in the window with its cosponsor parties and subjects
#[derive(Debug, Clone, Default)]
pub struct CandidateBill {
    pub bill_id: String,
    pub title: Option<String>,
    pub sponsor_bioguide: Option<String>,
    pub introduced_date: Option<NaiveDate>,
    pub cosponsor_count: usize,
    pub cosponsor_parties: BTreeSet<Party>,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BipartisanBill {
    pub bill_id: String,
    pub title: Option<String>,
    pub sponsor_bioguide: Option<String>,
    pub cosponsor_count: usize,
    pub party_count: usize,
    pub bipartisan_score: f64,
    pub subjects: Vec<String>,
    pub introduced_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HotspotAnalysis {
    pub total_bills_analyzed: usize,
    pub bipartisan_bills: Vec<BipartisanBill>,
    pub top_subjects: Vec<SubjectCount>,
}

type BillRow = (String, Option<String>, Option<String>, Option<NaiveDate>);

/// Load the congress's bills introduced inside the window
pub async fn load_candidates(
    pool: &SqlitePool,
    congress: u32,
    chamber: Chamber,
    window: AnalysisWindow,
) -> Result<Vec<CandidateBill>> {
    let bills: Vec<BillRow> = sqlx::query_as(
        r#"
        SELECT bill_id, title, sponsor_bioguide, introduced_date
        FROM bills
        WHERE congress = ? AND chamber = ?
          AND introduced_date >= ? AND introduced_date <= ?
        ORDER BY bill_id
        "#,
    )
    .bind(congress as i64)
    .bind(chamber.as_str())
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await?;

    let mut candidates: BTreeMap<String, CandidateBill> = bills
        .into_iter()
        .map(|(bill_id, title, sponsor_bioguide, introduced_date)| {
            let bill = CandidateBill {
                bill_id: bill_id.clone(),
                title,
                sponsor_bioguide,
                introduced_date,
                ..Default::default()
            };
            (bill_id, bill)
        })
        .collect();

    // Cosponsors missing from members count toward the total but carry no party
    let cosponsors: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT c.bill_id, m.member_id_bioguide, m.party
        FROM cosponsors c
        JOIN bills b ON b.bill_id = c.bill_id
        LEFT JOIN members m ON m.member_id_bioguide = c.member_id_bioguide
        WHERE b.congress = ? AND b.chamber = ?
          AND b.introduced_date >= ? AND b.introduced_date <= ?
        "#,
    )
    .bind(congress as i64)
    .bind(chamber.as_str())
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await?;
    for (bill_id, member, party) in cosponsors {
        if let Some(bill) = candidates.get_mut(&bill_id) {
            bill.cosponsor_count += 1;
            if member.is_some() {
                bill.cosponsor_parties.insert(Party::normalize(party.as_deref()));
            }
        }
    }

    let subjects: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT bs.bill_id, bs.subject_term
        FROM bill_subjects bs
        JOIN bills b ON b.bill_id = bs.bill_id
        WHERE b.congress = ? AND b.chamber = ?
          AND b.introduced_date >= ? AND b.introduced_date <= ?
        ORDER BY bs.id
        "#,
    )
    .bind(congress as i64)
    .bind(chamber.as_str())
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await?;
    for (bill_id, subject) in subjects {
        if let Some(bill) = candidates.get_mut(&bill_id) {
            bill.subjects.push(subject);
        }
    }

    Ok(candidates.into_values().collect())
}

/// Score candidates by the number of cosponsor parties, best first
pub fn rank_hotspots(candidates: Vec<CandidateBill>) -> HotspotAnalysis {
    let total_bills_analyzed = candidates.len();

    let mut bills: Vec<BipartisanBill> = candidates
        .into_iter()
        .filter(|bill| bill.cosponsor_count >= MIN_COSPONSORS && bill.cosponsor_parties.len() >= 2)
        .map(|bill| {
            let party_count = bill.cosponsor_parties.len();
            BipartisanBill {
                bill_id: bill.bill_id,
                title: bill.title,
                sponsor_bioguide: bill.sponsor_bioguide,
                cosponsor_count: bill.cosponsor_count,
                party_count,
                bipartisan_score: party_count as f64 / PARTY_SPAN,
                subjects: bill.subjects,
                introduced_date: bill.introduced_date,
            }
        })
        .collect();
    bills.sort_by(|a, b| {
        b.party_count
            .cmp(&a.party_count)
            .then_with(|| b.cosponsor_count.cmp(&a.cosponsor_count))
            .then_with(|| a.bill_id.cmp(&b.bill_id))
    });

    // Subjects are counted over every bipartisan bill, not just the listed ones
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for bill in &bills {
        for subject in &bill.subjects {
            *counts.entry(subject.as_str()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let top_subjects = ranked
        .into_iter()
        .take(TOP_HOTSPOT_SUBJECTS)
        .map(|(subject, count)| SubjectCount {
            subject: subject.to_string(),
            count,
        })
        .collect();

    bills.truncate(TOP_HOTSPOT_BILLS);
    HotspotAnalysis {
        total_bills_analyzed,
        bipartisan_bills: bills,
        top_subjects,
    }
}
