//! Party-line aggregation per roll call

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::dataset::VoteDataset;
use super::types::{Party, Position, VoteCode};

/// Number of votes listed as most partisan / most bipartisan
pub const TOP_VOTES: usize = 10;

/// Decisive Democratic and Republican votes on one roll call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartyTally {
    pub dem_yea: u32,
    pub dem_nay: u32,
    pub rep_yea: u32,
    pub rep_nay: u32,
}

impl PartyTally {
    /// Count decisive votes by chamber members of the two major parties
    pub fn for_rollcall(dataset: &VoteDataset, votes: &BTreeMap<String, VoteCode>) -> Self {
        let mut tally = Self::default();
        for (member_id, vote) in votes {
            if !vote.is_decisive() {
                continue;
            }
            let yea = *vote == VoteCode::Yea;
            match dataset.party_of(member_id) {
                Some(Party::Democrat) if yea => tally.dem_yea += 1,
                Some(Party::Democrat) => tally.dem_nay += 1,
                Some(Party::Republican) if yea => tally.rep_yea += 1,
                Some(Party::Republican) => tally.rep_nay += 1,
                _ => {}
            }
        }
        tally
    }

    /// (yea, nay) for a major party
    pub fn counts(&self, party: &Party) -> Option<(u32, u32)> {
        match party {
            Party::Democrat => Some((self.dem_yea, self.dem_nay)),
            Party::Republican => Some((self.rep_yea, self.rep_nay)),
            Party::Other(_) => None,
        }
    }

    /// Majority position of a major party; `None` for other parties
    pub fn position(&self, party: &Party) -> Option<Position> {
        self.counts(party)
            .map(|(yea, nay)| Position::from_counts(yea, nay))
    }

    /// Yea share of a party's decisive votes, as a percentage
    pub fn yea_pct(&self, party: &Party) -> Option<f64> {
        let (yea, nay) = self.counts(party)?;
        let total = yea + nay;
        (total > 0).then(|| yea as f64 / total as f64 * 100.0)
    }

    /// Both major parties cast at least one decisive vote
    pub fn both_parties_voted(&self) -> bool {
        self.dem_yea + self.dem_nay > 0 && self.rep_yea + self.rep_nay > 0
    }

    /// Party consensus used for cross-party voter detection: Yea iff yea% > 50
    pub fn consensus(&self, party: &Party) -> Option<VoteCode> {
        self.yea_pct(party)
            .map(|pct| if pct > 50.0 { VoteCode::Yea } else { VoteCode::Nay })
    }

    /// |D yea% − R yea%|: 100 is a pure party-line vote, 0 fully bipartisan
    pub fn party_line_score(&self) -> Option<f64> {
        let dem = self.yea_pct(&Party::Democrat)?;
        let rep = self.yea_pct(&Party::Republican)?;
        Some((dem - rep).abs())
    }
}

/// Tally every roll call in the dataset
pub fn tally_all(dataset: &VoteDataset) -> BTreeMap<String, PartyTally> {
    dataset
        .votes
        .iter()
        .map(|(rollcall_id, votes)| (rollcall_id.clone(), PartyTally::for_rollcall(dataset, votes)))
        .collect()
}

/// Roll call ranked by party-line score
#[derive(Debug, Clone, Serialize)]
pub struct PartisanVote {
    pub rollcall_id: String,
    pub party_line_score: f64,
    pub question: String,
    pub bill_id: Option<String>,
    pub bill_title: Option<String>,
    pub date: Option<chrono::NaiveDate>,
    pub tally: PartyTally,
}

fn scored(tallies: &BTreeMap<String, PartyTally>) -> Vec<(&String, f64)> {
    tallies
        .iter()
        .filter_map(|(id, tally)| tally.party_line_score().map(|score| (id, score)))
        .collect()
}

fn to_partisan_vote(dataset: &VoteDataset, tallies: &BTreeMap<String, PartyTally>, id: &str, score: f64) -> PartisanVote {
    let rollcall = dataset.rollcalls.get(id);
    PartisanVote {
        rollcall_id: id.to_string(),
        party_line_score: score,
        question: rollcall
            .and_then(|rc| rc.question.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        bill_id: rollcall.and_then(|rc| rc.bill_id.clone()),
        bill_title: rollcall.and_then(|rc| rc.bill_title.clone()),
        date: rollcall.map(|rc| rc.date),
        tally: tallies.get(id).copied().unwrap_or_default(),
    }
}

/// Highest party-line scores first; ties by roll call id
pub fn most_partisan(dataset: &VoteDataset, tallies: &BTreeMap<String, PartyTally>, limit: usize) -> Vec<PartisanVote> {
    let mut votes = scored(tallies);
    votes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(b.0)));
    votes
        .into_iter()
        .take(limit)
        .map(|(id, score)| to_partisan_vote(dataset, tallies, id, score))
        .collect()
}

/// Lowest party-line scores first; ties by roll call id
pub fn most_bipartisan(dataset: &VoteDataset, tallies: &BTreeMap<String, PartyTally>, limit: usize) -> Vec<PartisanVote> {
    let mut votes = scored(tallies);
    votes.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(b.0)));
    votes
        .into_iter()
        .take(limit)
        .map(|(id, score)| to_partisan_vote(dataset, tallies, id, score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dataset::fixtures::dataset;
    use crate::analysis::types::VoteCode::*;

    const PARTIES: [(&str, &str); 4] = [("D1", "D"), ("D2", "D"), ("R1", "R"), ("R2", "R")];

    #[test]
    fn test_tally_ignores_non_decisive_and_unknown_members() {
        let ds = dataset(
            &PARTIES,
            &[&[("D1", Yea), ("D2", Present), ("R1", Nay), ("R2", NotVoting), ("X9", Yea)]],
        );
        let tally = PartyTally::for_rollcall(&ds, &ds.votes["rc-001"]);
        assert_eq!(tally, PartyTally { dem_yea: 1, dem_nay: 0, rep_yea: 0, rep_nay: 1 });
        assert_eq!(tally.party_line_score(), Some(100.0));
    }

    #[test]
    fn test_score_undefined_when_one_party_absent() {
        let ds = dataset(&PARTIES, &[&[("D1", Yea), ("D2", Nay)]]);
        let tally = PartyTally::for_rollcall(&ds, &ds.votes["rc-001"]);
        assert_eq!(tally.party_line_score(), None);
        assert_eq!(tally.position(&Party::Democrat), Some(Position::Tie));
        assert_eq!(tally.position(&Party::Republican), Some(Position::Tie));
    }

    #[test]
    fn test_consensus_requires_strict_majority() {
        let tally = PartyTally { dem_yea: 1, dem_nay: 1, rep_yea: 2, rep_nay: 1 };
        assert_eq!(tally.consensus(&Party::Democrat), Some(Nay));
        assert_eq!(tally.consensus(&Party::Republican), Some(Yea));
        assert_eq!(tally.consensus(&Party::Other("I".into())), None);
    }

    #[test]
    fn test_ranking_orders_and_breaks_ties_by_id() {
        let ds = dataset(
            &PARTIES,
            &[
                // score 0
                &[("D1", Yea), ("D2", Yea), ("R1", Yea), ("R2", Yea)],
                // score 100
                &[("D1", Yea), ("D2", Yea), ("R1", Nay), ("R2", Nay)],
                // score 50
                &[("D1", Yea), ("D2", Yea), ("R1", Yea), ("R2", Nay)],
                // score 0
                &[("D1", Nay), ("D2", Nay), ("R1", Nay), ("R2", Nay)],
            ],
        );
        let tallies = tally_all(&ds);

        let partisan = most_partisan(&ds, &tallies, TOP_VOTES);
        let ids: Vec<_> = partisan.iter().map(|v| v.rollcall_id.as_str()).collect();
        assert_eq!(ids, vec!["rc-002", "rc-003", "rc-001", "rc-004"]);
        assert_eq!(partisan[0].question, "Question 2");

        let bipartisan = most_bipartisan(&ds, &tallies, 2);
        let ids: Vec<_> = bipartisan.iter().map(|v| v.rollcall_id.as_str()).collect();
        assert_eq!(ids, vec!["rc-001", "rc-004"]);
    }
}
