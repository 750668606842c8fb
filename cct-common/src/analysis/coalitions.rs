//! Coalition detection over a multiplex member network
//!
//! Edge weight between two members blends three layers:
//! `0.6 · vote agreement + 0.3 · cosponsorship Jaccard + 0.1 · amendment Jaccard`.
//! Communities are found by weighted label propagation with a fixed visiting
//! order, so the same data always yields the same coalitions.

use serde::Serialize;
use sqlx::SqlitePool;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::agreement::{density, AgreementMatrix};
use super::dataset::{AnalysisWindow, VoteDataset};
use super::types::{Chamber, Party};
use crate::Result;

pub const VOTE_WEIGHT: f64 = 0.6;
pub const COSPONSOR_WEIGHT: f64 = 0.3;
pub const AMENDMENT_WEIGHT: f64 = 0.1;

/// Edges lighter than this are dropped before community detection
pub const DEFAULT_MIN_EDGE_WEIGHT: f64 = 0.5;

/// Subjects reported per coalition
pub const TOP_SUBJECTS: usize = 5;

const MAX_PROPAGATION_ROUNDS: usize = 100;

/// Cosponsorship, amendment and subject data for one congress and chamber
#[derive(Debug, Clone, Default)]
pub struct SponsorshipData {
    /// member → bills cosponsored
    pub cosponsored: BTreeMap<String, BTreeSet<String>>,
    /// member → bills the member offered amendments to
    pub amended: BTreeMap<String, BTreeSet<String>>,
    /// bill → subject terms
    pub subjects: BTreeMap<String, Vec<String>>,
}

impl SponsorshipData {
    /// Load sponsorship activity on bills introduced inside the window
    pub async fn load(pool: &SqlitePool, congress: u32, chamber: Chamber, window: AnalysisWindow) -> Result<Self> {
        let mut data = Self::default();

        let cosponsors: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT c.member_id_bioguide, c.bill_id
            FROM cosponsors c
            JOIN bills b ON b.bill_id = c.bill_id
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
        for (member_id, bill_id) in cosponsors {
            data.cosponsored.entry(member_id).or_default().insert(bill_id);
        }

        let amendments: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT a.sponsor_bioguide, a.bill_id
            FROM amendments a
            JOIN bills b ON b.bill_id = a.bill_id
            WHERE b.congress = ? AND b.chamber = ? AND a.sponsor_bioguide IS NOT NULL
              AND a.introduced_date >= ? AND a.introduced_date <= ?
            "#,
        )
        .bind(congress as i64)
        .bind(chamber.as_str())
        .bind(window.start)
        .bind(window.end)
        .fetch_all(pool)
        .await?;
        for (member_id, bill_id) in amendments {
            data.amended.entry(member_id).or_default().insert(bill_id);
        }

        let subjects: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT bs.bill_id, bs.subject_term
            FROM bill_subjects bs
            JOIN bills b ON b.bill_id = bs.bill_id
            WHERE b.congress = ? AND b.chamber = ?
            "#,
        )
        .bind(congress as i64)
        .bind(chamber.as_str())
        .fetch_all(pool)
        .await?;
        for (bill_id, subject) in subjects {
            data.subjects.entry(bill_id).or_default().push(subject);
        }

        Ok(data)
    }

    pub fn cosponsor_similarity(&self, a: &str, b: &str) -> f64 {
        jaccard(self.cosponsored.get(a), self.cosponsored.get(b))
    }

    pub fn amendment_similarity(&self, a: &str, b: &str) -> f64 {
        jaccard(self.amended.get(a), self.amended.get(b))
    }

    /// Most frequent subjects across bills cosponsored by any of `members`
    pub fn top_subjects(&self, members: &[String], limit: usize) -> Vec<SubjectCount> {
        let bills: BTreeSet<&String> = members
            .iter()
            .filter_map(|m| self.cosponsored.get(m))
            .flatten()
            .collect();

        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for bill in bills {
            for subject in self.subjects.get(bill).into_iter().flatten() {
                *counts.entry(subject.as_str()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, u32)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(limit)
            .map(|(subject, count)| SubjectCount {
                subject: subject.to_string(),
                count,
            })
            .collect()
    }
}

/// |A ∩ B| / |A ∪ B|; 0 when either set is missing or both are empty
pub fn jaccard(a: Option<&BTreeSet<String>>, b: Option<&BTreeSet<String>>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectCount {
    pub subject: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoalitionMember {
    pub id: String,
    pub name: String,
    pub party: Party,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Coalition {
    pub id: usize,
    pub size: usize,
    pub members: Vec<String>,
    pub member_details: Vec<CoalitionMember>,
    pub party_composition: BTreeMap<String, u32>,
    pub bipartisan: bool,
    /// Mean pairwise vote agreement inside the coalition, 0–1
    pub avg_vote_agreement: f64,
    /// Mean pairwise cosponsorship Jaccard inside the coalition, 0–1
    pub avg_cosponsorship: f64,
    pub top_subjects: Vec<SubjectCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    pub nodes: usize,
    pub edges: usize,
    pub density: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoalitionAnalysis {
    pub total_members: usize,
    pub min_edge_weight: f64,
    pub coalitions: Vec<Coalition>,
    pub network_stats: NetworkStats,
}

/// Weighted undirected graph over member ids
#[derive(Debug, Clone, Default)]
pub struct MultiplexNetwork {
    pub nodes: BTreeSet<String>,
    /// node → neighbour → weight (stored in both directions)
    pub adjacency: BTreeMap<String, BTreeMap<String, f64>>,
}

impl MultiplexNetwork {
    /// Blend the three layers; nodes are members with at least one common decisive vote
    pub fn build(
        dataset: &VoteDataset,
        matrix: &AgreementMatrix,
        sponsorship: &SponsorshipData,
        min_edge_weight: f64,
    ) -> Self {
        let mut network = Self::default();

        for (a, b, agreement) in matrix.iter() {
            network.nodes.insert(a.to_string());
            network.nodes.insert(b.to_string());

            let weight = VOTE_WEIGHT * agreement.fraction()
                + COSPONSOR_WEIGHT * sponsorship.cosponsor_similarity(a, b)
                + AMENDMENT_WEIGHT * sponsorship.amendment_similarity(a, b);
            if weight > 0.0 && weight >= min_edge_weight {
                network.add_edge(a, b, weight);
            }
        }

        debug!(
            "Multiplex network for {} {}: {} nodes, {} edges",
            dataset.congress,
            dataset.chamber,
            network.nodes.len(),
            network.edge_count()
        );
        network
    }

    pub fn add_edge(&mut self, a: &str, b: &str, weight: f64) {
        self.nodes.insert(a.to_string());
        self.nodes.insert(b.to_string());
        self.adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string(), weight);
        self.adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string(), weight);
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum::<usize>() / 2
    }

    /// Weighted label propagation
    ///
    /// Every node starts in its own community and repeatedly adopts the label
    /// carrying the most edge weight among its neighbours (smallest label on
    /// ties) until no label changes.
    pub fn communities(&self) -> Vec<Vec<String>> {
        let mut labels: BTreeMap<&str, &str> = self.nodes.iter().map(|n| (n.as_str(), n.as_str())).collect();

        for _ in 0..MAX_PROPAGATION_ROUNDS {
            let mut changed = false;
            for node in &self.nodes {
                let Some(neighbours) = self.adjacency.get(node) else {
                    continue;
                };
                let mut scores: BTreeMap<&str, f64> = BTreeMap::new();
                for (neighbour, weight) in neighbours {
                    let label = labels.get(neighbour.as_str()).copied().unwrap_or(neighbour.as_str());
                    *scores.entry(label).or_insert(0.0) += weight;
                }
                // Labels arrive in ascending order; equal weight keeps the earlier one
                let best = scores
                    .into_iter()
                    .fold(None::<(&str, f64)>, |best, (label, score)| match best {
                        Some((_, top)) if score.partial_cmp(&top) != Some(Ordering::Greater) => best,
                        _ => Some((label, score)),
                    })
                    .map(|(label, _)| label);

                if let Some(best) = best {
                    if labels.get(node.as_str()) != Some(&best) {
                        labels.insert(node.as_str(), best);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (node, label) in labels {
            groups.entry(label).or_default().push(node.to_string());
        }
        groups.into_values().collect()
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn member_pairs(members: &[String]) -> impl Iterator<Item = (&String, &String)> {
    members
        .iter()
        .enumerate()
        .flat_map(move |(i, a)| members[i + 1..].iter().map(move |b| (a, b)))
}

/// Detect coalitions of two or more members, largest first
pub fn detect_coalitions(
    dataset: &VoteDataset,
    matrix: &AgreementMatrix,
    sponsorship: &SponsorshipData,
    min_edge_weight: f64,
) -> CoalitionAnalysis {
    let network = MultiplexNetwork::build(dataset, matrix, sponsorship, min_edge_weight);

    let mut groups: Vec<Vec<String>> = network
        .communities()
        .into_iter()
        .filter(|group| group.len() >= 2)
        .collect();
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));

    let coalitions = groups
        .into_iter()
        .enumerate()
        .map(|(index, members)| {
            let member_details: Vec<CoalitionMember> = members
                .iter()
                .map(|id| match dataset.members.get(id) {
                    Some(info) => CoalitionMember {
                        id: id.clone(),
                        name: info.name.clone(),
                        party: info.party.clone(),
                        state: info.state.clone(),
                    },
                    None => CoalitionMember {
                        id: id.clone(),
                        name: "Unknown".to_string(),
                        party: Party::Other("Unknown".to_string()),
                        state: None,
                    },
                })
                .collect();

            let mut party_composition = BTreeMap::new();
            for member in &member_details {
                *party_composition.entry(member.party.code().to_string()).or_insert(0) += 1;
            }

            let avg_vote_agreement = average(
                member_pairs(&members).filter_map(|(a, b)| matrix.get(a, b).map(|p| p.fraction())),
            );
            let avg_cosponsorship = average(
                member_pairs(&members).map(|(a, b)| sponsorship.cosponsor_similarity(a, b)),
            );

            Coalition {
                id: index + 1,
                size: members.len(),
                bipartisan: party_composition.len() > 1,
                top_subjects: sponsorship.top_subjects(&members, TOP_SUBJECTS),
                members,
                member_details,
                party_composition,
                avg_vote_agreement,
                avg_cosponsorship,
            }
        })
        .collect();

    let nodes = network.nodes.len();
    let edges = network.edge_count();
    CoalitionAnalysis {
        total_members: dataset.members.len(),
        min_edge_weight,
        coalitions,
        network_stats: NetworkStats {
            nodes,
            edges,
            density: density(nodes, edges),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dataset::fixtures::dataset;
    use crate::analysis::types::VoteCode::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_jaccard() {
        let a = set(&["b1", "b2", "b3"]);
        let b = set(&["b2", "b3", "b4"]);
        assert_eq!(jaccard(Some(&a), Some(&b)), 0.5);
        assert_eq!(jaccard(Some(&a), None), 0.0);
        assert_eq!(jaccard(Some(&set(&[])), Some(&set(&[]))), 0.0);
    }

    #[test]
    fn test_label_propagation_splits_disconnected_cliques() {
        let mut network = MultiplexNetwork::default();
        network.add_edge("A", "B", 0.9);
        network.add_edge("B", "C", 0.8);
        network.add_edge("A", "C", 0.7);
        network.add_edge("X", "Y", 0.6);
        network.nodes.insert("LONER".to_string());

        let communities = network.communities();
        assert_eq!(communities.len(), 3);
        assert!(communities.contains(&vec!["A".to_string(), "B".to_string(), "C".to_string()]));
        assert!(communities.contains(&vec!["X".to_string(), "Y".to_string()]));
        assert_eq!(network.edge_count(), 4);
    }

    #[test]
    fn test_detects_party_blocs() {
        let parties = [("D1", "D"), ("D2", "D"), ("D3", "D"), ("R1", "R"), ("R2", "R"), ("R3", "R")];
        let row: &[(&str, crate::analysis::types::VoteCode)] =
            &[("D1", Yea), ("D2", Yea), ("D3", Yea), ("R1", Nay), ("R2", Nay), ("R3", Nay)];
        let rows = vec![row; 12];
        let ds = dataset(&parties, &rows);
        let matrix = AgreementMatrix::compute(&ds);

        let mut sponsorship = SponsorshipData::default();
        sponsorship.cosponsored.insert("D1".into(), set(&["hr-1", "hr-2"]));
        sponsorship.cosponsored.insert("D2".into(), set(&["hr-1"]));
        sponsorship.subjects.insert("hr-1".into(), vec!["Health".into(), "Taxation".into()]);
        sponsorship.subjects.insert("hr-2".into(), vec!["Health".into()]);

        let analysis = detect_coalitions(&ds, &matrix, &sponsorship, DEFAULT_MIN_EDGE_WEIGHT);
        assert_eq!(analysis.coalitions.len(), 2);
        assert_eq!(analysis.network_stats.nodes, 6);
        assert_eq!(analysis.network_stats.edges, 6);

        let dems = analysis
            .coalitions
            .iter()
            .find(|c| c.members.contains(&"D1".to_string()))
            .unwrap();
        assert_eq!(dems.size, 3);
        assert!(!dems.bipartisan);
        assert_eq!(dems.avg_vote_agreement, 1.0);
        assert_eq!(dems.party_composition["D"], 3);
        assert_eq!(dems.top_subjects[0].subject, "Health");
        assert_eq!(dems.top_subjects[0].count, 2);
        // D1-D2 share 1 of 2 bills; pairs with D3 share nothing
        assert!((dems.avg_cosponsorship - 0.5 / 3.0).abs() < 1e-9);
    }
}
