//! Members who break from a strong party position

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::dataset::VoteDataset;
use super::types::{Party, VoteCode};

/// Share of a party that must vote one way for the vote to count as a party position
pub const DEFAULT_PARTY_THRESHOLD: f64 = 0.8;

/// Parties with fewer recorded votes on a roll call have no position
pub const MIN_PARTY_VOTES: u32 = 5;

#[derive(Debug, Clone, Copy, Default)]
struct PartyCounts {
    yea: u32,
    nay: u32,
    total: u32,
}

impl PartyCounts {
    /// Position held by at least `threshold` of the party, if any
    fn position(&self, threshold: f64, min_votes: u32) -> Option<(VoteCode, f64, f64)> {
        if self.total < min_votes || self.total == 0 {
            return None;
        }
        let yea_pct = self.yea as f64 / self.total as f64;
        let nay_pct = self.nay as f64 / self.total as f64;
        if yea_pct >= threshold {
            Some((VoteCode::Yea, yea_pct, nay_pct))
        } else if nay_pct >= threshold {
            Some((VoteCode::Nay, yea_pct, nay_pct))
        } else {
            None
        }
    }
}

/// One decisive vote against the member's party position
#[derive(Debug, Clone, Serialize)]
pub struct PartyDeviation {
    pub rollcall_id: String,
    pub member_id: String,
    pub member_name: String,
    pub party: Party,
    pub vote: VoteCode,
    pub party_position: VoteCode,
    pub party_yea_pct: f64,
    pub party_nay_pct: f64,
    pub date: Option<NaiveDate>,
    pub question: Option<String>,
    pub bill_id: Option<String>,
}

/// Scan every roll call for votes cast against a party position
///
/// Party totals include Present and Not Voting, so a party with many
/// abstentions rarely reaches the threshold.
pub fn detect_party_line_deviations(dataset: &VoteDataset, threshold: f64, min_party_votes: u32) -> Vec<PartyDeviation> {
    let mut deviations = Vec::new();

    for (rollcall_id, votes) in &dataset.votes {
        let mut counts: BTreeMap<&Party, PartyCounts> = BTreeMap::new();
        for (member_id, vote) in votes {
            let Some(party) = dataset.party_of(member_id) else {
                continue;
            };
            let entry = counts.entry(party).or_default();
            entry.total += 1;
            match vote {
                VoteCode::Yea => entry.yea += 1,
                VoteCode::Nay => entry.nay += 1,
                _ => {}
            }
        }

        let positions: BTreeMap<&Party, (VoteCode, f64, f64)> = counts
            .into_iter()
            .filter_map(|(party, c)| c.position(threshold, min_party_votes).map(|p| (party, p)))
            .collect();
        if positions.is_empty() {
            continue;
        }

        let rollcall = dataset.rollcalls.get(rollcall_id);
        for (member_id, vote) in votes {
            if !vote.is_decisive() {
                continue;
            }
            let Some(member) = dataset.members.get(member_id) else {
                continue;
            };
            let Some(&(position, yea_pct, nay_pct)) = positions.get(&member.party) else {
                continue;
            };
            if *vote == position {
                continue;
            }
            deviations.push(PartyDeviation {
                rollcall_id: rollcall_id.clone(),
                member_id: member_id.clone(),
                member_name: member.name.clone(),
                party: member.party.clone(),
                vote: *vote,
                party_position: position,
                party_yea_pct: yea_pct,
                party_nay_pct: nay_pct,
                date: rollcall.map(|rc| rc.date),
                question: rollcall.and_then(|rc| rc.question.clone()),
                bill_id: rollcall.and_then(|rc| rc.bill_id.clone()),
            });
        }
    }

    deviations
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviationCount {
    pub member_id: String,
    pub member_name: String,
    pub party: Party,
    pub deviations: usize,
}

/// Members ranked by number of deviations, most first
pub fn deviation_counts(dataset: &VoteDataset, deviations: &[PartyDeviation]) -> Vec<DeviationCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for deviation in deviations {
        *counts.entry(deviation.member_id.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<DeviationCount> = counts
        .into_iter()
        .filter_map(|(id, deviations)| {
            let member = dataset.members.get(id)?;
            Some(DeviationCount {
                member_id: id.to_string(),
                member_name: member.name.clone(),
                party: member.party.clone(),
                deviations,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.deviations.cmp(&a.deviations).then_with(|| a.member_id.cmp(&b.member_id)));
    ranked
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlierAnalysis {
    pub threshold: f64,
    pub min_party_votes: u32,
    pub total_outliers: usize,
    pub members: Vec<DeviationCount>,
    pub party_line_deviations: Vec<PartyDeviation>,
}

impl OutlierAnalysis {
    pub fn build(dataset: &VoteDataset, threshold: f64, min_party_votes: u32) -> Self {
        let deviations = detect_party_line_deviations(dataset, threshold, min_party_votes);
        Self {
            threshold,
            min_party_votes,
            total_outliers: deviations.len(),
            members: deviation_counts(dataset, &deviations),
            party_line_deviations: deviations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dataset::fixtures::dataset;
    use crate::analysis::types::VoteCode::*;

    const PARTIES: [(&str, &str); 10] = [
        ("D1", "D"),
        ("D2", "D"),
        ("D3", "D"),
        ("D4", "D"),
        ("D5", "D"),
        ("R1", "R"),
        ("R2", "R"),
        ("R3", "R"),
        ("R4", "R"),
        ("R5", "R"),
    ];

    #[test]
    fn test_flags_vote_against_strong_party_position() {
        let row: &[(&str, VoteCode)] = &[
            ("D1", Yea),
            ("D2", Yea),
            ("D3", Yea),
            ("D4", Yea),
            ("D5", Nay),
            ("R1", Nay),
            ("R2", Nay),
            ("R3", Nay),
            ("R4", Nay),
            ("R5", Nay),
        ];
        let ds = dataset(&PARTIES, &[row]);

        let deviations = detect_party_line_deviations(&ds, DEFAULT_PARTY_THRESHOLD, MIN_PARTY_VOTES);
        assert_eq!(deviations.len(), 1);
        let d = &deviations[0];
        assert_eq!(d.member_id, "D5");
        assert_eq!(d.vote, Nay);
        assert_eq!(d.party_position, Yea);
        assert_eq!(d.party_yea_pct, 0.8);
        assert_eq!(d.question.as_deref(), Some("Question 1"));
    }

    #[test]
    fn test_split_party_has_no_position() {
        // 3 of 5 is below the threshold
        let row: &[(&str, VoteCode)] = &[
            ("D1", Yea),
            ("D2", Yea),
            ("D3", Yea),
            ("D4", Nay),
            ("D5", Nay),
        ];
        let ds = dataset(&PARTIES, &[row]);
        assert!(detect_party_line_deviations(&ds, DEFAULT_PARTY_THRESHOLD, MIN_PARTY_VOTES).is_empty());
    }

    #[test]
    fn test_small_party_groups_are_skipped() {
        let row: &[(&str, VoteCode)] = &[("D1", Yea), ("D2", Yea), ("D3", Yea), ("D4", Nay)];
        let ds = dataset(&PARTIES, &[row]);
        assert!(detect_party_line_deviations(&ds, 0.7, MIN_PARTY_VOTES).is_empty());
        assert_eq!(detect_party_line_deviations(&ds, 0.7, 4).len(), 1);
    }

    #[test]
    fn test_abstentions_count_toward_party_total() {
        // 4 Yea of 6 recorded is 0.67, no position; Present is never a deviation
        let parties = [("D1", "D"), ("D2", "D"), ("D3", "D"), ("D4", "D"), ("D5", "D"), ("D6", "D")];
        let row: &[(&str, VoteCode)] = &[
            ("D1", Yea),
            ("D2", Yea),
            ("D3", Yea),
            ("D4", Yea),
            ("D5", Present),
            ("D6", Nay),
        ];
        let ds = dataset(&parties, &[row]);
        assert!(detect_party_line_deviations(&ds, DEFAULT_PARTY_THRESHOLD, MIN_PARTY_VOTES).is_empty());
        let deviations = detect_party_line_deviations(&ds, 0.6, MIN_PARTY_VOTES);
        assert_eq!(deviations.len(), 1);
        assert_eq!(deviations[0].member_id, "D6");
    }

    #[test]
    fn test_analysis_ranks_members_by_deviations() {
        let first: &[(&str, VoteCode)] = &[
            ("R1", Nay),
            ("R2", Yea),
            ("R3", Yea),
            ("R4", Yea),
            ("R5", Yea),
            ("D1", Yea),
        ];
        let second: &[(&str, VoteCode)] = &[
            ("R1", Nay),
            ("R2", Nay),
            ("R3", Nay),
            ("R4", Nay),
            ("R5", Yea),
        ];
        let third: &[(&str, VoteCode)] = &[
            ("R1", Yea),
            ("R2", Nay),
            ("R3", Nay),
            ("R4", Nay),
            ("R5", Nay),
        ];
        let ds = dataset(&PARTIES, &[first, second, third]);

        let analysis = OutlierAnalysis::build(&ds, DEFAULT_PARTY_THRESHOLD, MIN_PARTY_VOTES);
        assert_eq!(analysis.total_outliers, 3);
        assert_eq!(analysis.members.len(), 2);
        assert_eq!(analysis.members[0].member_id, "R1");
        assert_eq!(analysis.members[0].deviations, 2);
        assert_eq!(analysis.members[1].member_id, "R5");
        assert_eq!(analysis.party_line_deviations[0].rollcall_id, "rc-001");
    }
}
