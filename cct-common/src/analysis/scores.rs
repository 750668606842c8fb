//! Per-member voting statistics, cross-party voting and ideology profiles

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::dataset::VoteDataset;
use super::party::PartyTally;
use super::types::{Party, Position, VoteCode};

/// Decisive votes a member needs before appearing as a cross-party voter
pub const MIN_CROSS_PARTY_VOTES: u32 = 10;
/// Against-party rate (percent) that qualifies as cross-party voting
pub const MIN_CROSS_PARTY_PCT: f64 = 5.0;
/// Cross-party voters listed in the coalition report
pub const TOP_CROSS_PARTY_VOTERS: usize = 20;

const COORDINATED_MIN_CROSSERS: u32 = 2;
const COORDINATED_WEIGHT: f64 = 3.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VotingStats {
    pub total_votes: u32,
    pub yea_votes: u32,
    pub nay_votes: u32,
    pub present_votes: u32,
    pub yea_percentage: f64,
    pub nay_percentage: f64,
}

impl VotingStats {
    pub fn from_votes(votes: impl IntoIterator<Item = VoteCode>) -> Self {
        let mut stats = Self::default();
        for vote in votes {
            stats.total_votes += 1;
            match vote {
                VoteCode::Yea => stats.yea_votes += 1,
                VoteCode::Nay => stats.nay_votes += 1,
                VoteCode::Present => stats.present_votes += 1,
                VoteCode::NotVoting => {}
            }
        }
        if stats.total_votes > 0 {
            let total = stats.total_votes as f64;
            stats.yea_percentage = stats.yea_votes as f64 / total * 100.0;
            stats.nay_percentage = stats.nay_votes as f64 / total * 100.0;
        }
        stats
    }
}

/// Voting statistics for every chamber member
pub fn voting_statistics(dataset: &VoteDataset) -> BTreeMap<String, VotingStats> {
    dataset
        .members
        .keys()
        .map(|id| {
            let stats = VotingStats::from_votes(dataset.member_votes(id).map(|(_, vote)| vote));
            (id.clone(), stats)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CrossPartyVoter {
    pub member_id: String,
    pub name: String,
    pub party: Party,
    pub state: Option<String>,
    pub cross_party_percentage: f64,
    pub total_votes: u32,
    pub cross_party_votes: u32,
}

/// Members who vote against their party's consensus at least 5% of the time
///
/// A vote counts against the party only on roll calls where both major
/// parties voted. Sorted by rate, highest first.
pub fn cross_party_voters(dataset: &VoteDataset, tallies: &BTreeMap<String, PartyTally>) -> Vec<CrossPartyVoter> {
    let mut voters = Vec::new();

    for member in dataset.members.values() {
        if !member.party.is_major() {
            continue;
        }

        let mut decisive = 0u32;
        let mut against = 0u32;
        for (rollcall_id, vote) in dataset.member_votes(&member.id) {
            if !vote.is_decisive() {
                continue;
            }
            decisive += 1;
            let Some(tally) = tallies.get(rollcall_id) else {
                continue;
            };
            if !tally.both_parties_voted() {
                continue;
            }
            if tally.consensus(&member.party).is_some_and(|consensus| consensus != vote) {
                against += 1;
            }
        }

        if decisive < MIN_CROSS_PARTY_VOTES {
            continue;
        }
        let pct = against as f64 / decisive as f64 * 100.0;
        if pct >= MIN_CROSS_PARTY_PCT {
            voters.push(CrossPartyVoter {
                member_id: member.id.clone(),
                name: member.name.clone(),
                party: member.party.clone(),
                state: member.state.clone(),
                cross_party_percentage: pct,
                total_votes: decisive,
                cross_party_votes: against,
            });
        }
    }

    voters.sort_by(|a, b| {
        b.cross_party_percentage
            .partial_cmp(&a.cross_party_percentage)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
    voters
}

/// Voting-behaviour profile of a Democrat or Republican
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeologyProfile {
    pub name: String,
    pub party: Party,
    pub state: Option<String>,
    pub district: Option<i64>,
    pub total_votes: u32,
    pub party_line_percentage: f64,
    pub cross_party_percentage: f64,
    pub ideological_score: f64,
    pub partyliner_score: f64,
    pub labels: Vec<String>,
    pub primary_label: String,
}

impl IdeologyProfile {
    /// Placeholder for members absent from the profile set
    pub fn not_found() -> Self {
        Self {
            name: "Unknown".to_string(),
            party: Party::Other("Unknown".to_string()),
            state: None,
            district: None,
            total_votes: 0,
            party_line_percentage: 0.0,
            cross_party_percentage: 0.0,
            ideological_score: 0.0,
            partyliner_score: 0.5,
            labels: vec!["Member Not Found".to_string()],
            primary_label: "Member Not Found".to_string(),
        }
    }

    /// Copy with percentages rounded to one decimal for presentation
    pub fn rounded(&self) -> Self {
        let round1 = |v: f64| (v * 10.0).round() / 10.0;
        Self {
            party_line_percentage: round1(self.party_line_percentage),
            cross_party_percentage: round1(self.cross_party_percentage),
            ideological_score: round1(self.ideological_score),
            ..self.clone()
        }
    }
}

/// Look up a profile, falling back to [`IdeologyProfile::not_found`]
pub fn profile_or_placeholder(profiles: &BTreeMap<String, IdeologyProfile>, member_id: &str) -> IdeologyProfile {
    profiles
        .get(member_id)
        .cloned()
        .unwrap_or_else(IdeologyProfile::not_found)
}

/// Weighted share of a member's votes cast with the party position
///
/// Each vote weighs `|party_proportion − 0.5| + 0.1`, where the proportion is
/// the party's share voting with its own position. Crossing over with at
/// least one other party member in a way that flipped the outcome weighs
/// three times as much. Tied party positions are skipped. With no weighted
/// votes the score is 0.5; a member who never left the party scores exactly 1.0.
pub fn partyliner_score(
    dataset: &VoteDataset,
    tallies: &BTreeMap<String, PartyTally>,
    member_id: &str,
    party: &Party,
) -> f64 {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut always_with_party = true;

    for (rollcall_id, vote) in dataset.member_votes(member_id) {
        if !vote.is_decisive() {
            continue;
        }
        let Some(tally) = tallies.get(rollcall_id) else {
            continue;
        };
        let Some((party_yea, party_nay)) = tally.counts(party) else {
            continue;
        };
        let position = Position::from_counts(party_yea, party_nay);
        let party_total = party_yea + party_nay;
        if position == Position::Tie || party_total == 0 {
            continue;
        }

        let (with_position, crossers) = match position {
            Position::Yea => (party_yea, party_nay),
            _ => (party_nay, party_yea),
        };
        let proportion = with_position as f64 / party_total as f64;
        let mut weight = (proportion - 0.5).abs() + 0.1;

        let with_party = position.matches(vote);
        if !with_party {
            always_with_party = false;
            if crossers >= COORDINATED_MIN_CROSSERS
                && crossover_changed_outcome(dataset, rollcall_id, position, crossers)
            {
                weight *= COORDINATED_WEIGHT;
            }
        }

        if with_party {
            weighted_sum += weight;
        }
        total_weight += weight;
    }

    if total_weight == 0.0 {
        0.5
    } else if always_with_party {
        1.0
    } else {
        weighted_sum / total_weight
    }
}

/// Whether the roll call result would flip had the crossers voted with their party
fn crossover_changed_outcome(dataset: &VoteDataset, rollcall_id: &str, position: Position, crossers: u32) -> bool {
    let Some(votes) = dataset.votes.get(rollcall_id) else {
        return false;
    };
    let yea = votes.values().filter(|v| **v == VoteCode::Yea).count() as i64;
    let nay = votes.values().filter(|v| **v == VoteCode::Nay).count() as i64;
    let crossers = crossers as i64;

    let (hyp_yea, hyp_nay) = match position {
        Position::Yea => (yea + crossers, nay - crossers),
        _ => (yea - crossers, nay + crossers),
    };
    (yea > nay) != (hyp_yea > hyp_nay)
}

/// Voting-behaviour labels; the first entry is the primary label
pub fn assign_labels(party: &Party, party_line_pct: f64, cross_party_pct: f64, ideological_score: f64, partyliner: f64) -> Vec<String> {
    let mut labels = Vec::new();

    match party {
        Party::Democrat => labels.push(if partyliner >= 0.995 {
            "True Blue Democrat"
        } else if party_line_pct < 70.0 {
            if cross_party_pct > 20.0 {
                "Cross-Party Democrat"
            } else {
                "Moderate Democrat"
            }
        } else {
            "Mainstream Democrat"
        }),
        Party::Republican => labels.push(if partyliner >= 0.98 {
            "MAGA Republican"
        } else if party_line_pct < 70.0 {
            if cross_party_pct > 20.0 {
                "Cross-Party Republican"
            } else {
                "Independent Republican"
            }
        } else {
            "Mainstream Republican"
        }),
        Party::Other(_) => {}
    }

    if ideological_score > 80.0 {
        labels.push("Party Loyalist");
    } else if ideological_score < 20.0 {
        labels.push("Bipartisan");
    } else if ideological_score < 50.0 {
        labels.push("Moderate");
    }

    labels.into_iter().map(String::from).collect()
}

/// Ideology profiles for every Democrat and Republican in the chamber
pub fn ideology_profiles(dataset: &VoteDataset, tallies: &BTreeMap<String, PartyTally>) -> BTreeMap<String, IdeologyProfile> {
    let mut profiles = BTreeMap::new();

    for member in dataset.members.values() {
        let Some(opposite) = member.party.opposite() else {
            continue;
        };

        let mut total = 0u32;
        let mut party_line = 0u32;
        let mut cross_party = 0u32;
        for (rollcall_id, vote) in dataset.member_votes(&member.id) {
            if !vote.is_decisive() {
                continue;
            }
            total += 1;
            let Some(tally) = tallies.get(rollcall_id) else {
                continue;
            };
            let own = tally.position(&member.party);
            let other = tally.position(&opposite);
            if own.is_some_and(|p| p.matches(vote)) {
                party_line += 1;
            } else if other.is_some_and(|p| p.matches(vote)) {
                cross_party += 1;
            }
        }

        let pct = |n: u32| if total > 0 { n as f64 / total as f64 * 100.0 } else { 0.0 };
        let party_line_percentage = pct(party_line);
        let cross_party_percentage = pct(cross_party);
        let ideological_score = party_line_percentage - cross_party_percentage;
        let partyliner = partyliner_score(dataset, tallies, &member.id, &member.party);
        let labels = assign_labels(
            &member.party,
            party_line_percentage,
            cross_party_percentage,
            ideological_score,
            partyliner,
        );
        let primary_label = labels
            .first()
            .cloned()
            .unwrap_or_else(|| "Unclassified".to_string());

        profiles.insert(
            member.id.clone(),
            IdeologyProfile {
                name: member.name.clone(),
                party: member.party.clone(),
                state: member.state.clone(),
                district: member.district,
                total_votes: total,
                party_line_percentage,
                cross_party_percentage,
                ideological_score,
                partyliner_score: partyliner,
                labels,
                primary_label,
            },
        );
    }

    profiles
}

/// Number of members carrying each label
pub fn label_distribution(profiles: &BTreeMap<String, IdeologyProfile>) -> BTreeMap<String, u32> {
    let mut distribution = BTreeMap::new();
    for label in profiles.values().flat_map(|p| p.labels.iter()) {
        *distribution.entry(label.clone()).or_insert(0) += 1;
    }
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dataset::fixtures::dataset;
    use crate::analysis::party::tally_all;
    use crate::analysis::types::VoteCode::*;

    #[test]
    fn test_voting_stats_percentages() {
        let stats = VotingStats::from_votes([Yea, Yea, Nay, Present]);
        assert_eq!(stats.total_votes, 4);
        assert_eq!(stats.yea_percentage, 50.0);
        assert_eq!(stats.nay_percentage, 25.0);
        assert_eq!(VotingStats::from_votes(Vec::new()).yea_percentage, 0.0);
    }

    #[test]
    fn test_loyal_member_scores_exactly_one() {
        let rows: &[&[(&str, VoteCode)]] = &[
            &[("D1", Yea), ("D2", Yea), ("D3", Nay), ("R1", Nay)],
            &[("D1", Nay), ("D2", Nay), ("D3", Nay), ("R1", Yea)],
        ];
        let ds = dataset(&[("D1", "D"), ("D2", "D"), ("D3", "D"), ("R1", "R")], rows);
        let tallies = tally_all(&ds);
        assert_eq!(partyliner_score(&ds, &tallies, "D1", &Party::Democrat), 1.0);
    }

    #[test]
    fn test_no_weighted_votes_scores_half() {
        // Democrats split evenly on the only roll call
        let rows: &[&[(&str, VoteCode)]] = &[&[("D1", Yea), ("D2", Nay), ("R1", Nay)]];
        let ds = dataset(&[("D1", "D"), ("D2", "D"), ("R1", "R")], rows);
        let tallies = tally_all(&ds);
        assert_eq!(partyliner_score(&ds, &tallies, "D1", &Party::Democrat), 0.5);
        assert_eq!(partyliner_score(&ds, &tallies, "NOPE", &Party::Democrat), 0.5);
    }

    #[test]
    fn test_coordinated_crossover_is_overweighted() {
        // Party position Yea (3 of 5); two Democrats cross and the measure fails 4-4.
        // Had they voted Yea it would have passed, so their crossover weighs triple.
        let parties = [("D1", "D"), ("D2", "D"), ("D3", "D"), ("D4", "D"), ("D5", "D"), ("R1", "R"), ("R2", "R"), ("R3", "R")];
        let rows: &[&[(&str, VoteCode)]] = &[
            &[("D1", Yea), ("D2", Yea), ("D3", Yea), ("D4", Nay), ("D5", Nay), ("R1", Nay), ("R2", Nay), ("R3", Yea)],
            &[("D1", Yea), ("D2", Yea), ("D3", Yea), ("D4", Yea), ("D5", Yea), ("R1", Nay), ("R2", Nay), ("R3", Nay)],
        ];
        let ds = dataset(&parties, rows);
        let tallies = tally_all(&ds);

        // rc-001: proportion 0.6 → weight 0.2, tripled to 0.6 (against)
        // rc-002: proportion 1.0 → weight 0.6 (with)
        let score = partyliner_score(&ds, &tallies, "D4", &Party::Democrat);
        assert!((score - 0.5).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn test_cross_party_voters_threshold() {
        let mut rows: Vec<Vec<(&str, VoteCode)>> = Vec::new();
        for i in 0..10 {
            // R2 breaks with Republicans on the first two roll calls
            let r2 = if i < 2 { Yea } else { Nay };
            rows.push(vec![("D1", Yea), ("D2", Yea), ("R1", Nay), ("R2", r2), ("R3", Nay)]);
        }
        let row_refs: Vec<&[(&str, VoteCode)]> = rows.iter().map(Vec::as_slice).collect();
        let ds = dataset(&[("D1", "D"), ("D2", "D"), ("R1", "R"), ("R2", "R"), ("R3", "R")], &row_refs);
        let tallies = tally_all(&ds);

        let voters = cross_party_voters(&ds, &tallies);
        assert_eq!(voters.len(), 1);
        assert_eq!(voters[0].member_id, "R2");
        assert_eq!(voters[0].cross_party_votes, 2);
        assert_eq!(voters[0].cross_party_percentage, 20.0);
    }

    #[test]
    fn test_labels() {
        assert_eq!(assign_labels(&Party::Democrat, 100.0, 0.0, 100.0, 1.0), vec!["True Blue Democrat", "Party Loyalist"]);
        assert_eq!(assign_labels(&Party::Democrat, 60.0, 30.0, 30.0, 0.6), vec!["Cross-Party Democrat", "Moderate"]);
        assert_eq!(assign_labels(&Party::Republican, 65.0, 10.0, 55.0, 0.7), vec!["Independent Republican"]);
        assert_eq!(assign_labels(&Party::Republican, 90.0, 5.0, 85.0, 0.9), vec!["Mainstream Republican", "Party Loyalist"]);
        assert_eq!(assign_labels(&Party::Republican, 50.0, 40.0, 10.0, 0.5), vec!["Cross-Party Republican", "Bipartisan"]);
    }

    #[test]
    fn test_profiles_and_placeholder() {
        let rows: &[&[(&str, VoteCode)]] = &[
            &[("D1", Yea), ("D2", Yea), ("R1", Nay), ("R2", Nay), ("I1", Yea)],
            &[("D1", Nay), ("D2", Yea), ("R1", Nay), ("R2", Nay)],
        ];
        let ds = dataset(&[("D1", "D"), ("D2", "D"), ("R1", "R"), ("R2", "R"), ("I1", "I")], rows);
        let tallies = tally_all(&ds);
        let profiles = ideology_profiles(&ds, &tallies);

        assert!(!profiles.contains_key("I1"));
        let r1 = &profiles["R1"];
        assert_eq!(r1.party_line_percentage, 100.0);
        assert_eq!(r1.primary_label, "MAGA Republican");

        // rc-002: Democrats tie 1-1, so D1's Nay matches only the Republican position
        let d1 = &profiles["D1"];
        assert_eq!(d1.party_line_percentage, 50.0);
        assert_eq!(d1.cross_party_percentage, 50.0);
        assert_eq!(d1.ideological_score, 0.0);

        let missing = profile_or_placeholder(&profiles, "Z9");
        assert_eq!(missing.primary_label, "Member Not Found");
        let distribution = label_distribution(&profiles);
        assert_eq!(distribution["MAGA Republican"], 2);
        assert_eq!(distribution["True Blue Democrat"], 2);
        assert_eq!(distribution["Bipartisan"], 1);
    }
}
