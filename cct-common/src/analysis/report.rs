//! Analysis reports served by the dashboard and kept warm in the cache

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use super::agreement::{
    agreement_network, most_different_pairs, most_similar_pairs, AgreementMatrix, AgreementNetwork, VotingPair,
    DEFAULT_AGREEMENT_THRESHOLD, DEFAULT_MIN_COMMON_VOTES, TOP_PAIRS,
};
use super::coalitions::{detect_coalitions, CoalitionAnalysis, SponsorshipData, DEFAULT_MIN_EDGE_WEIGHT};
use super::dataset::{AnalysisWindow, RecentBill, VoteDataset};
use super::hotspots::{load_candidates, rank_hotspots, HotspotAnalysis};
use super::outliers::{OutlierAnalysis, DEFAULT_PARTY_THRESHOLD, MIN_PARTY_VOTES};
use super::party::{most_bipartisan, most_partisan, tally_all, PartisanVote, TOP_VOTES};
use super::scores::{
    cross_party_voters, ideology_profiles, label_distribution, voting_statistics, CrossPartyVoter, IdeologyProfile,
    VotingStats, TOP_CROSS_PARTY_VOTERS,
};
use super::types::Chamber;
use crate::db::caucus::active_caucus_names;
use crate::{Error, Result};

/// Report families stored in the analysis cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// Party-line, cross-party and pairwise agreement dashboard report
    #[serde(rename = "analysis")]
    Coalition,
    Ideology,
    Network,
    Coalitions,
    Bills,
    /// Votes cast against a strong party position
    Outliers,
    #[serde(rename = "bipartisan")]
    Hotspots,
    /// Coalitions, outliers and hotspots in one payload
    Complete,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 8] = [
        AnalysisKind::Coalition,
        AnalysisKind::Ideology,
        AnalysisKind::Network,
        AnalysisKind::Coalitions,
        AnalysisKind::Bills,
        AnalysisKind::Outliers,
        AnalysisKind::Hotspots,
        AnalysisKind::Complete,
    ];

    /// Segment used in cache keys
    pub fn key_segment(&self) -> &'static str {
        match self {
            AnalysisKind::Coalition => "analysis",
            AnalysisKind::Ideology => "ideology",
            AnalysisKind::Network => "network",
            AnalysisKind::Coalitions => "coalitions",
            AnalysisKind::Bills => "bills",
            AnalysisKind::Outliers => "outliers",
            AnalysisKind::Hotspots => "bipartisan",
            AnalysisKind::Complete => "complete",
        }
    }

    /// Reports that embed caucus membership and go stale when it changes
    pub fn depends_on_caucuses(&self) -> bool {
        matches!(self, AnalysisKind::Ideology)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_segment())
    }
}

impl FromStr for AnalysisKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AnalysisKind::ALL
            .into_iter()
            .find(|kind| kind.key_segment() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown analysis kind '{}'", s)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    pub congress: u32,
    pub chamber: Chamber,
    pub analysis_date: DateTime<Utc>,
    pub window_days: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl AnalysisMetadata {
    fn new(congress: u32, chamber: Chamber, window: AnalysisWindow) -> Self {
        Self {
            congress,
            chamber,
            analysis_date: Utc::now(),
            window_days: window.days(),
            start_date: window.start,
            end_date: window.end,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoalitionSummary {
    pub total_members: usize,
    pub total_rollcalls: usize,
    pub total_votes: usize,
    pub recent_bills: usize,
    pub analysis_period: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VotingAnalysis {
    pub most_partisan_votes: Vec<PartisanVote>,
    pub most_bipartisan_votes: Vec<PartisanVote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberAnalysis {
    pub most_similar_voters: Vec<VotingPair>,
    pub most_different_voters: Vec<VotingPair>,
    pub cross_party_voters: Vec<CrossPartyVoter>,
    pub voting_statistics: BTreeMap<String, VotingStats>,
}

/// Dashboard report: party-line votes, cross-party voters, voting pairs
#[derive(Debug, Clone, Serialize)]
pub struct CoalitionReport {
    pub analysis_metadata: AnalysisMetadata,
    pub summary: CoalitionSummary,
    pub voting_analysis: VotingAnalysis,
    pub member_analysis: MemberAnalysis,
    pub recent_bills: Vec<RecentBill>,
}

impl CoalitionReport {
    pub fn build(dataset: &VoteDataset) -> Self {
        let tallies = tally_all(dataset);
        let matrix = AgreementMatrix::compute(dataset);
        let mut cross_party = cross_party_voters(dataset, &tallies);
        cross_party.truncate(TOP_CROSS_PARTY_VOTERS);

        Self {
            analysis_metadata: AnalysisMetadata::new(dataset.congress, dataset.chamber, dataset.window),
            summary: CoalitionSummary {
                total_members: dataset.members.len(),
                total_rollcalls: dataset.rollcalls.len(),
                total_votes: dataset.vote_count(),
                recent_bills: dataset.recent_bills.len(),
                analysis_period: format!("{} to {}", dataset.window.start, dataset.window.end),
            },
            voting_analysis: VotingAnalysis {
                most_partisan_votes: most_partisan(dataset, &tallies, TOP_VOTES),
                most_bipartisan_votes: most_bipartisan(dataset, &tallies, TOP_VOTES),
            },
            member_analysis: MemberAnalysis {
                most_similar_voters: most_similar_pairs(dataset, &matrix, TOP_PAIRS),
                most_different_voters: most_different_pairs(dataset, &matrix, TOP_PAIRS),
                cross_party_voters: cross_party,
                voting_statistics: voting_statistics(dataset),
            },
            recent_bills: dataset.recent_bills.clone(),
        }
    }
}

/// Ideology profile plus the member's current caucuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeologyEntry {
    #[serde(flatten)]
    pub profile: IdeologyProfile,
    #[serde(default)]
    pub caucuses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdeologyReport {
    pub analysis_metadata: AnalysisMetadata,
    pub total_members: usize,
    pub profiles: BTreeMap<String, IdeologyEntry>,
    pub label_distribution: BTreeMap<String, u32>,
}

impl IdeologyReport {
    pub fn build(dataset: &VoteDataset, caucuses: &BTreeMap<String, Vec<String>>) -> Self {
        let tallies = tally_all(dataset);
        let profiles = ideology_profiles(dataset, &tallies);
        let distribution = label_distribution(&profiles);

        let profiles: BTreeMap<String, IdeologyEntry> = profiles
            .into_iter()
            .map(|(id, profile)| {
                let entry = IdeologyEntry {
                    profile: profile.rounded(),
                    caucuses: caucuses.get(&id).cloned().unwrap_or_default(),
                };
                (id, entry)
            })
            .collect();

        Self {
            analysis_metadata: AnalysisMetadata::new(dataset.congress, dataset.chamber, dataset.window),
            total_members: profiles.len(),
            profiles,
            label_distribution: distribution,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub analysis_metadata: AnalysisMetadata,
    #[serde(flatten)]
    pub network: AgreementNetwork,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoalitionsReport {
    pub analysis_metadata: AnalysisMetadata,
    #[serde(flatten)]
    pub analysis: CoalitionAnalysis,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutliersReport {
    pub analysis_metadata: AnalysisMetadata,
    #[serde(flatten)]
    pub analysis: OutlierAnalysis,
}

#[derive(Debug, Clone, Serialize)]
pub struct HotspotsReport {
    pub analysis_metadata: AnalysisMetadata,
    #[serde(flatten)]
    pub analysis: HotspotAnalysis,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteSummary {
    pub total_coalitions: usize,
    pub total_outliers: usize,
    pub bipartisan_bills: usize,
    pub total_members: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteReport {
    pub analysis_metadata: AnalysisMetadata,
    pub coalition_analysis: CoalitionAnalysis,
    pub outlier_analysis: OutlierAnalysis,
    pub bipartisan_analysis: HotspotAnalysis,
    pub summary: CompleteSummary,
}

impl CompleteReport {
    pub fn new(
        metadata: AnalysisMetadata,
        coalition_analysis: CoalitionAnalysis,
        outlier_analysis: OutlierAnalysis,
        bipartisan_analysis: HotspotAnalysis,
    ) -> Self {
        let summary = CompleteSummary {
            total_coalitions: coalition_analysis.coalitions.len(),
            total_outliers: outlier_analysis.total_outliers,
            bipartisan_bills: bipartisan_analysis.bipartisan_bills.len(),
            total_members: coalition_analysis.total_members,
        };
        Self {
            analysis_metadata: metadata,
            coalition_analysis,
            outlier_analysis,
            bipartisan_analysis,
            summary,
        }
    }
}

/// One row of the bills listing
#[derive(Debug, Clone, Serialize)]
pub struct BillListing {
    pub id: String,
    pub title: String,
    pub congress: i64,
    pub chamber: String,
    pub number: i64,
    #[serde(rename = "type")]
    pub bill_type: String,
    pub sponsor: String,
    pub sponsor_party: Option<String>,
    pub cosponsor_count: i64,
    pub introduced_date: Option<NaiveDate>,
    pub last_action_date: Option<NaiveDate>,
    pub last_action_code: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct BillListingRow {
    bill_id: String,
    title: Option<String>,
    congress: i64,
    chamber: String,
    number: i64,
    bill_type: String,
    introduced_date: Option<NaiveDate>,
    first: Option<String>,
    last: Option<String>,
    party: Option<String>,
    cosponsor_count: i64,
    action_date: Option<NaiveDate>,
    action_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillsReport {
    pub congress: u32,
    pub chamber: Chamber,
    pub count: usize,
    pub bills: Vec<BillListing>,
}

impl BillsReport {
    /// Bills with sponsor, cosponsor count and latest action, most recent action first
    pub async fn load(pool: &SqlitePool, congress: u32, chamber: Chamber) -> Result<Self> {
        let rows = sqlx::query_as::<_, BillListingRow>(
            r#"
            SELECT b.bill_id, b.title, b.congress, b.chamber, b.number, b.type AS bill_type,
                   b.introduced_date, m.first, m.last, m.party,
                   (SELECT COUNT(*) FROM cosponsors c WHERE c.bill_id = b.bill_id) AS cosponsor_count,
                   la.action_date, la.action_code
            FROM bills b
            LEFT JOIN members m ON m.member_id_bioguide = b.sponsor_bioguide
            LEFT JOIN (
                SELECT bill_id, action_date, action_code,
                       ROW_NUMBER() OVER (PARTITION BY bill_id ORDER BY action_date DESC, id DESC) AS rn
                FROM actions
            ) la ON la.bill_id = b.bill_id AND la.rn = 1
            WHERE b.congress = ? AND b.chamber = ?
            ORDER BY la.action_date IS NULL, la.action_date DESC, b.bill_id
            "#,
        )
        .bind(congress as i64)
        .bind(chamber.as_str())
        .fetch_all(pool)
        .await?;

        let bills: Vec<BillListing> = rows
            .into_iter()
            .map(|row| {
                let sponsor = match (&row.first, &row.last) {
                    (Some(first), Some(last)) => format!("{} {}", first, last),
                    _ => "Unknown".to_string(),
                };
                BillListing {
                    id: row.bill_id,
                    title: row.title.unwrap_or_default(),
                    congress: row.congress,
                    chamber: title_case(&row.chamber),
                    number: row.number,
                    bill_type: row.bill_type.to_uppercase(),
                    sponsor,
                    sponsor_party: row.party,
                    cosponsor_count: row.cosponsor_count,
                    introduced_date: row.introduced_date,
                    last_action_date: row.action_date,
                    last_action_code: row.action_code,
                }
            })
            .collect();

        Ok(Self {
            congress,
            chamber,
            count: bills.len(),
            bills,
        })
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Compute one report from the store
pub async fn compute(
    pool: &SqlitePool,
    kind: AnalysisKind,
    congress: u32,
    chamber: Chamber,
    today: NaiveDate,
) -> Result<serde_json::Value> {
    let started = std::time::Instant::now();
    let window = AnalysisWindow::for_congress(congress, today)?;

    let value = match kind {
        AnalysisKind::Coalition => {
            let dataset = VoteDataset::load(pool, congress, chamber, window).await?;
            serde_json::to_value(CoalitionReport::build(&dataset))?
        }
        AnalysisKind::Ideology => {
            let dataset = VoteDataset::load(pool, congress, chamber, window).await?;
            let caucuses = active_caucus_names(pool).await?;
            serde_json::to_value(IdeologyReport::build(&dataset, &caucuses))?
        }
        AnalysisKind::Network => {
            let dataset = VoteDataset::load(pool, congress, chamber, window).await?;
            let matrix = AgreementMatrix::compute(&dataset);
            serde_json::to_value(NetworkReport {
                analysis_metadata: AnalysisMetadata::new(congress, chamber, window),
                network: agreement_network(&dataset, &matrix, DEFAULT_AGREEMENT_THRESHOLD, DEFAULT_MIN_COMMON_VOTES),
            })?
        }
        AnalysisKind::Coalitions => {
            let dataset = VoteDataset::load(pool, congress, chamber, window).await?;
            let sponsorship = SponsorshipData::load(pool, congress, chamber, window).await?;
            let matrix = AgreementMatrix::compute(&dataset);
            serde_json::to_value(CoalitionsReport {
                analysis_metadata: AnalysisMetadata::new(congress, chamber, window),
                analysis: detect_coalitions(&dataset, &matrix, &sponsorship, DEFAULT_MIN_EDGE_WEIGHT),
            })?
        }
        AnalysisKind::Bills => serde_json::to_value(BillsReport::load(pool, congress, chamber).await?)?,
        AnalysisKind::Outliers => {
            let dataset = VoteDataset::load(pool, congress, chamber, window).await?;
            serde_json::to_value(OutliersReport {
                analysis_metadata: AnalysisMetadata::new(congress, chamber, window),
                analysis: OutlierAnalysis::build(&dataset, DEFAULT_PARTY_THRESHOLD, MIN_PARTY_VOTES),
            })?
        }
        AnalysisKind::Hotspots => {
            let candidates = load_candidates(pool, congress, chamber, window).await?;
            serde_json::to_value(HotspotsReport {
                analysis_metadata: AnalysisMetadata::new(congress, chamber, window),
                analysis: rank_hotspots(candidates),
            })?
        }
        AnalysisKind::Complete => {
            let dataset = VoteDataset::load(pool, congress, chamber, window).await?;
            let sponsorship = SponsorshipData::load(pool, congress, chamber, window).await?;
            let candidates = load_candidates(pool, congress, chamber, window).await?;
            let matrix = AgreementMatrix::compute(&dataset);
            serde_json::to_value(CompleteReport::new(
                AnalysisMetadata::new(congress, chamber, window),
                detect_coalitions(&dataset, &matrix, &sponsorship, DEFAULT_MIN_EDGE_WEIGHT),
                OutlierAnalysis::build(&dataset, DEFAULT_PARTY_THRESHOLD, MIN_PARTY_VOTES),
                rank_hotspots(candidates),
            ))?
        }
    };

    info!(
        "Computed {} report for {} {} in {:?}",
        kind,
        congress,
        chamber,
        started.elapsed()
    );
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_key_segments_round_trip() {
        for kind in AnalysisKind::ALL {
            assert_eq!(kind.key_segment().parse::<AnalysisKind>().unwrap(), kind);
        }
        assert_eq!(AnalysisKind::Coalition.to_string(), "analysis");
        assert!("coalition".parse::<AnalysisKind>().is_err());
        assert_eq!("bipartisan".parse::<AnalysisKind>().unwrap(), AnalysisKind::Hotspots);
        assert_eq!(
            serde_json::to_value(AnalysisKind::Hotspots).unwrap(),
            serde_json::json!(AnalysisKind::Hotspots.key_segment())
        );
    }

    #[tokio::test]
    async fn test_complete_report_summarizes_each_part() {
        use crate::analysis::dataset::fixtures::{date, execute_script};
        use crate::db::init::init_memory_database;

        let pool = init_memory_database().await.unwrap();
        let mut script = String::from(
            "INSERT INTO members (member_id_bioguide, first, last, party, state, district) VALUES \
             ('D1', 'A', 'One', 'D', 'CA', 1), ('D2', 'B', 'Two', 'D', 'CA', 2), ('D3', 'C', 'Three', 'D', 'CA', 3), \
             ('D4', 'D', 'Four', 'D', 'CA', 4), ('D5', 'E', 'Five', 'D', 'CA', 5), ('R1', 'F', 'Six', 'R', 'TX', 1);",
        );
        script.push_str(
            "INSERT INTO rollcalls (rollcall_id, congress, chamber, session, rc_number, date, question) VALUES \
             ('rc-1', 119, 'house', 1, 1, '2025-02-01', 'On Passage');",
        );
        script.push_str(
            "INSERT INTO votes (rollcall_id, member_id_bioguide, vote_code) VALUES \
             ('rc-1', 'D1', 'Yea'), ('rc-1', 'D2', 'Yea'), ('rc-1', 'D3', 'Yea'), ('rc-1', 'D4', 'Yea'), \
             ('rc-1', 'D5', 'Nay'), ('rc-1', 'R1', 'Nay');",
        );
        script.push_str(
            "INSERT INTO bills (bill_id, congress, chamber, number, type, title, introduced_date) VALUES \
             ('hr-1', 119, 'house', 1, 'hr', 'Roads', '2025-02-01');",
        );
        script.push_str(
            "INSERT INTO cosponsors (bill_id, member_id_bioguide, date) VALUES \
             ('hr-1', 'D1', '2025-02-02'), ('hr-1', 'D2', '2025-02-02'), ('hr-1', 'D3', '2025-02-02'), \
             ('hr-1', 'D4', '2025-02-02'), ('hr-1', 'R1', '2025-02-02');",
        );
        execute_script(&pool, &script).await;

        let value = compute(&pool, AnalysisKind::Complete, 119, Chamber::House, date(2025, 3, 1))
            .await
            .unwrap();
        assert_eq!(value["summary"]["total_outliers"], 1);
        assert_eq!(value["summary"]["bipartisan_bills"], 1);
        assert_eq!(value["summary"]["total_members"], 6);
        assert_eq!(value["outlier_analysis"]["party_line_deviations"][0]["member_id"], "D5");
        assert_eq!(value["bipartisan_analysis"]["bipartisan_bills"][0]["bill_id"], "hr-1");
        assert_eq!(value["analysis_metadata"]["congress"], 119);
    }

    #[test]
    fn test_only_ideology_depends_on_caucuses() {
        let dependent: Vec<_> = AnalysisKind::ALL
            .into_iter()
            .filter(AnalysisKind::depends_on_caucuses)
            .collect();
        assert_eq!(dependent, vec![AnalysisKind::Ideology]);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("house"), "House");
        assert_eq!(title_case("SENATE"), "Senate");
        assert_eq!(title_case(""), "");
    }
}
