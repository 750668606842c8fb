//! Pairwise vote agreement and the agreement network

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use super::dataset::VoteDataset;
use super::types::{Party, VoteCode};

/// Pairs listed as most similar / most different
pub const TOP_PAIRS: usize = 10;

/// Agreement percentage a pair needs to be linked in the network
pub const DEFAULT_AGREEMENT_THRESHOLD: f64 = 90.0;
/// Common decisive votes a pair needs to be linked in the network
pub const DEFAULT_MIN_COMMON_VOTES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairAgreement {
    pub agreed: u32,
    pub common: u32,
}

impl PairAgreement {
    pub fn percentage(&self) -> f64 {
        if self.common == 0 {
            0.0
        } else {
            self.agreed as f64 / self.common as f64 * 100.0
        }
    }

    pub fn fraction(&self) -> f64 {
        self.percentage() / 100.0
    }
}

/// Agreement for every pair with at least one common decisive vote
///
/// Keys are `(a, b)` with `a < b`.
#[derive(Debug, Clone, Default)]
pub struct AgreementMatrix {
    pairs: BTreeMap<(String, String), PairAgreement>,
}

impl AgreementMatrix {
    /// Compare decisive votes of chamber members roll call by roll call
    pub fn compute(dataset: &VoteDataset) -> Self {
        let mut pairs: BTreeMap<(String, String), PairAgreement> = BTreeMap::new();

        for votes in dataset.votes.values() {
            let decisive: Vec<(&String, VoteCode)> = votes
                .iter()
                .filter(|(id, vote)| vote.is_decisive() && dataset.members.contains_key(*id))
                .map(|(id, vote)| (id, *vote))
                .collect();

            // BTreeMap iteration is sorted, so i < j implies id_i < id_j
            for (i, (a, vote_a)) in decisive.iter().enumerate() {
                for (b, vote_b) in &decisive[i + 1..] {
                    let entry = pairs
                        .entry(((*a).clone(), (*b).clone()))
                        .or_insert(PairAgreement { agreed: 0, common: 0 });
                    entry.common += 1;
                    if vote_a == vote_b {
                        entry.agreed += 1;
                    }
                }
            }
        }

        Self { pairs }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<PairAgreement> {
        let key = if a < b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.pairs.get(&key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, PairAgreement)> {
        self.pairs
            .iter()
            .map(|((a, b), agreement)| (a.as_str(), b.as_str(), *agreement))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VotingPair {
    pub member1: String,
    pub member2: String,
    pub member1_id: String,
    pub member2_id: String,
    pub party1: Party,
    pub party2: Party,
    pub agreement: f64,
    pub common_votes: u32,
}

fn ranked_pairs(dataset: &VoteDataset, matrix: &AgreementMatrix, descending: bool, limit: usize) -> Vec<VotingPair> {
    let mut pairs: Vec<(&str, &str, PairAgreement)> = matrix.iter().collect();
    pairs.sort_by(|x, y| {
        let order = x.2.percentage().partial_cmp(&y.2.percentage()).unwrap_or(Ordering::Equal);
        let order = if descending { order.reverse() } else { order };
        order.then_with(|| (x.0, x.1).cmp(&(y.0, y.1)))
    });

    pairs
        .into_iter()
        .filter_map(|(a, b, agreement)| {
            let m1 = dataset.members.get(a)?;
            let m2 = dataset.members.get(b)?;
            Some(VotingPair {
                member1: m1.name.clone(),
                member2: m2.name.clone(),
                member1_id: a.to_string(),
                member2_id: b.to_string(),
                party1: m1.party.clone(),
                party2: m2.party.clone(),
                agreement: agreement.percentage(),
                common_votes: agreement.common,
            })
        })
        .take(limit)
        .collect()
}

/// Highest agreement first
pub fn most_similar_pairs(dataset: &VoteDataset, matrix: &AgreementMatrix, limit: usize) -> Vec<VotingPair> {
    ranked_pairs(dataset, matrix, true, limit)
}

/// Lowest agreement first
pub fn most_different_pairs(dataset: &VoteDataset, matrix: &AgreementMatrix, limit: usize) -> Vec<VotingPair> {
    ranked_pairs(dataset, matrix, false, limit)
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkNode {
    pub id: String,
    pub name: String,
    pub party: Party,
    pub state: Option<String>,
    pub degree: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub agreement: f64,
    pub common_votes: u32,
    pub cross_party: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgreementNetwork {
    pub threshold: f64,
    pub min_common_votes: u32,
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

/// Graph density `2E / (N(N−1))`; 0 for fewer than two nodes
pub fn density(nodes: usize, edges: usize) -> f64 {
    if nodes < 2 {
        0.0
    } else {
        2.0 * edges as f64 / (nodes as f64 * (nodes as f64 - 1.0))
    }
}

/// Members linked by high agreement over enough common votes
///
/// Nodes are chamber members with at least one decisive vote.
pub fn agreement_network(
    dataset: &VoteDataset,
    matrix: &AgreementMatrix,
    threshold: f64,
    min_common_votes: u32,
) -> AgreementNetwork {
    let voters: BTreeSet<&str> = dataset
        .votes
        .values()
        .flat_map(|votes| votes.iter())
        .filter(|(id, vote)| vote.is_decisive() && dataset.members.contains_key(*id))
        .map(|(id, _)| id.as_str())
        .collect();

    let mut degrees: BTreeMap<&str, usize> = voters.iter().map(|id| (*id, 0)).collect();
    let mut edges = Vec::new();
    for (a, b, agreement) in matrix.iter() {
        if agreement.common < min_common_votes || agreement.percentage() < threshold {
            continue;
        }
        *degrees.entry(a).or_insert(0) += 1;
        *degrees.entry(b).or_insert(0) += 1;
        let cross_party = dataset.party_of(a) != dataset.party_of(b);
        edges.push(NetworkEdge {
            source: a.to_string(),
            target: b.to_string(),
            agreement: agreement.percentage(),
            common_votes: agreement.common,
            cross_party,
        });
    }

    let nodes: Vec<NetworkNode> = degrees
        .into_iter()
        .filter_map(|(id, degree)| {
            let member = dataset.members.get(id)?;
            Some(NetworkNode {
                id: id.to_string(),
                name: member.name.clone(),
                party: member.party.clone(),
                state: member.state.clone(),
                degree,
            })
        })
        .collect();

    AgreementNetwork {
        threshold,
        min_common_votes,
        node_count: nodes.len(),
        edge_count: edges.len(),
        density: density(nodes.len(), edges.len()),
        nodes,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dataset::fixtures::dataset;
    use crate::analysis::types::VoteCode::*;

    fn sample() -> VoteDataset {
        dataset(
            &[("A", "D"), ("B", "D"), ("C", "R"), ("D", "R")],
            &[
                &[("A", Yea), ("B", Yea), ("C", Nay), ("D", Present)],
                &[("A", Yea), ("B", Nay), ("C", Nay), ("D", Nay)],
                &[("A", Nay), ("B", Nay), ("C", Yea), ("OUT", Yea)],
            ],
        )
    }

    #[test]
    fn test_pairwise_agreement_counts_only_decisive_votes() {
        let ds = sample();
        let matrix = AgreementMatrix::compute(&ds);

        let ab = matrix.get("B", "A").unwrap();
        assert_eq!((ab.agreed, ab.common), (2, 3));
        let cd = matrix.get("C", "D").unwrap();
        assert_eq!((cd.agreed, cd.common), (1, 1));
        assert!(matrix.get("A", "OUT").is_none());
        assert_eq!(matrix.len(), 6);
    }

    #[test]
    fn test_pair_ranking() {
        let ds = sample();
        let matrix = AgreementMatrix::compute(&ds);

        let similar = most_similar_pairs(&ds, &matrix, 2);
        // B-D and C-D both sit at 100%; ids break the tie
        assert_eq!(similar[0].agreement, 100.0);
        assert_eq!((similar[0].member1_id.as_str(), similar[0].member2_id.as_str()), ("B", "D"));

        let different = most_different_pairs(&ds, &matrix, 1);
        assert_eq!((different[0].member1_id.as_str(), different[0].member2_id.as_str()), ("A", "C"));
        assert_eq!(different[0].agreement, 0.0);
    }

    #[test]
    fn test_network_thresholds_and_density() {
        let ds = sample();
        let matrix = AgreementMatrix::compute(&ds);

        let strict = agreement_network(&ds, &matrix, DEFAULT_AGREEMENT_THRESHOLD, DEFAULT_MIN_COMMON_VOTES);
        assert_eq!(strict.node_count, 4);
        assert_eq!(strict.edge_count, 0);
        assert_eq!(strict.density, 0.0);

        let loose = agreement_network(&ds, &matrix, 60.0, 1);
        // A-B (66.7%), B-D (100%) and C-D (100%)
        assert_eq!(loose.edge_count, 3);
        assert!((loose.density - 0.5).abs() < 1e-9);
        assert!(loose.edges.iter().any(|e| e.source == "B" && e.target == "D" && e.cross_party));
    }

    #[test]
    fn test_density_edge_cases() {
        assert_eq!(density(0, 0), 0.0);
        assert_eq!(density(1, 0), 0.0);
        assert_eq!(density(3, 3), 1.0);
    }
}
