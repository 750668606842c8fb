//! Cosponsorship graphs for the network views
//!
//! Every graph is built from sponsor → cosponsor pairs on bills. Self links
//! (a sponsor listed as their own cosponsor) are skipped everywhere.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use cct_common::analysis::Party;
use cct_common::db::caucus::{active_member_ids, get_caucus};
use cct_common::db::models::display_name;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Bills listed on a caucus-network edge tooltip
const CAUCUS_EDGE_BILLS: usize = 5;

/// Node colour by party
pub(crate) fn party_color(party: Option<&str>) -> &'static str {
    match Party::normalize(party) {
        Party::Democrat => "#1f77b4",
        Party::Republican => "#d62728",
        Party::Other(_) => "#ff7f0e",
    }
}

fn party_matches(member_party: Option<&str>, filter: Option<&str>) -> bool {
    match filter {
        Some(filter) if !filter.trim().is_empty() => {
            Party::normalize(member_party) == Party::normalize(Some(filter))
        }
        _ => true,
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct NetworkMember {
    member_id_bioguide: String,
    first: Option<String>,
    last: Option<String>,
    party: Option<String>,
    state: Option<String>,
    district: Option<i64>,
}

impl NetworkMember {
    fn name(&self) -> String {
        display_name(self.first.as_deref(), self.last.as_deref())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CosponsorshipRow {
    bill_id: String,
    title: Option<String>,
    bill_type: String,
    number: i64,
    sponsor: String,
    cosponsor: String,
    date: Option<NaiveDate>,
}

impl CosponsorshipRow {
    fn bill_title(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => format!("{} {}", self.bill_type.to_uppercase(), self.number),
        }
    }

    fn link_bill(&self) -> LinkBill {
        LinkBill {
            bill_id: self.bill_id.clone(),
            bill_title: self.bill_title(),
            cosponsor_date: self.date,
        }
    }
}

const COSPONSORSHIP_SELECT: &str = r#"
    SELECT b.bill_id, b.title, b.type AS bill_type, b.number,
           b.sponsor_bioguide AS sponsor, c.member_id_bioguide AS cosponsor, c.date
    FROM cosponsors c
    JOIN bills b ON b.bill_id = c.bill_id
    WHERE b.sponsor_bioguide IS NOT NULL AND b.sponsor_bioguide != c.member_id_bioguide
"#;

async fn house_members(pool: &SqlitePool) -> ApiResult<Vec<NetworkMember>> {
    let members = sqlx::query_as::<_, NetworkMember>(
        r#"
        SELECT member_id_bioguide, first, last, party, state, district
        FROM members WHERE district IS NOT NULL
        ORDER BY member_id_bioguide
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(members)
}

async fn members_by_id(pool: &SqlitePool, ids: &HashSet<String>) -> ApiResult<Vec<NetworkMember>> {
    let all = sqlx::query_as::<_, NetworkMember>(
        "SELECT member_id_bioguide, first, last, party, state, district FROM members ORDER BY member_id_bioguide",
    )
    .fetch_all(pool)
    .await?;
    Ok(all.into_iter().filter(|m| ids.contains(&m.member_id_bioguide)).collect())
}

/// Bills sponsored per member, optionally House bills only
async fn sponsored_counts(pool: &SqlitePool, house_only: bool) -> ApiResult<HashMap<String, i64>> {
    let sql = if house_only {
        "SELECT sponsor_bioguide, COUNT(*) FROM bills WHERE sponsor_bioguide IS NOT NULL AND chamber = 'house' GROUP BY sponsor_bioguide"
    } else {
        "SELECT sponsor_bioguide, COUNT(*) FROM bills WHERE sponsor_bioguide IS NOT NULL GROUP BY sponsor_bioguide"
    };
    let rows: Vec<(String, i64)> = sqlx::query_as(sql).fetch_all(pool).await?;
    Ok(rows.into_iter().collect())
}

async fn house_cosponsorships(pool: &SqlitePool) -> ApiResult<Vec<CosponsorshipRow>> {
    let sql = format!("{} AND b.chamber = 'house' ORDER BY b.bill_id, c.id", COSPONSORSHIP_SELECT);
    Ok(sqlx::query_as::<_, CosponsorshipRow>(&sql).fetch_all(pool).await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkBill {
    pub bill_id: String,
    pub bill_title: String,
    pub cosponsor_date: Option<NaiveDate>,
}

/// Directed sponsor → cosponsor relationship with every bill behind it
#[derive(Debug, Clone)]
struct GroupedEdge {
    source: String,
    target: String,
    bills: Vec<LinkBill>,
}

/// Group rows by (sponsor, cosponsor), keeping first-seen order
fn group_edges<'a>(rows: impl IntoIterator<Item = &'a CosponsorshipRow>) -> Vec<GroupedEdge> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut edges: Vec<GroupedEdge> = Vec::new();

    for row in rows {
        let key = (row.sponsor.clone(), row.cosponsor.clone());
        let slot = *index.entry(key).or_insert_with(|| {
            edges.push(GroupedEdge {
                source: row.sponsor.clone(),
                target: row.cosponsor.clone(),
                bills: Vec::new(),
            });
            edges.len() - 1
        });
        edges[slot].bills.push(row.link_bill());
    }
    edges
}

#[derive(Debug, Serialize)]
pub struct NetworkNode {
    pub id: String,
    pub label: String,
    pub party: Option<String>,
    pub state: Option<String>,
    pub district: Option<i64>,
    pub color: &'static str,
    pub bills_sponsored: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_target: Option<bool>,
}

impl NetworkNode {
    fn from_member(member: &NetworkMember, bills_sponsored: i64) -> Self {
        Self {
            id: member.member_id_bioguide.clone(),
            label: member.name(),
            party: member.party.clone(),
            state: member.state.clone(),
            district: member.district,
            color: party_color(member.party.as_deref()),
            bills_sponsored,
            is_target: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NetworkLink {
    pub source: String,
    pub target: String,
    pub bill_id: String,
    pub bill_title: String,
    pub cosponsor_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_bills: Option<Vec<LinkBill>>,
}

impl NetworkLink {
    /// Link carrying its first bill's details plus the full bill list
    fn from_edge(edge: GroupedEdge) -> Option<Self> {
        let first = edge.bills.first()?.clone();
        Some(Self {
            source: edge.source,
            target: edge.target,
            bill_id: first.bill_id,
            bill_title: first.bill_title,
            cosponsor_date: first.cosponsor_date,
            all_bills: Some(edge.bills),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct NetworkGraph {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartyFilter {
    pub party: Option<String>,
}

/// GET /api/network/cosponsorship[?party=]
///
/// One link per cosponsorship between House members in the graph.
pub async fn cosponsorship_network(
    State(state): State<AppState>,
    WithRejection(Query(filter), _): WithRejection<Query<PartyFilter>, ApiError>,
) -> ApiResult<Json<NetworkGraph>> {
    let members = house_members(&state.db).await?;
    let counts = sponsored_counts(&state.db, true).await?;

    let nodes: Vec<NetworkNode> = members
        .iter()
        .filter(|m| party_matches(m.party.as_deref(), filter.party.as_deref()))
        .map(|m| NetworkNode::from_member(m, counts.get(&m.member_id_bioguide).copied().unwrap_or(0)))
        .collect();
    let in_graph: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let links = house_cosponsorships(&state.db)
        .await?
        .into_iter()
        .filter(|row| in_graph.contains(row.sponsor.as_str()) && in_graph.contains(row.cosponsor.as_str()))
        .map(|row| {
            let bill = row.link_bill();
            NetworkLink {
                source: row.sponsor,
                target: row.cosponsor,
                bill_id: bill.bill_id,
                bill_title: bill.bill_title,
                cosponsor_date: bill.cosponsor_date,
                all_bills: None,
            }
        })
        .collect();

    Ok(Json(NetworkGraph { nodes, links }))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimplifiedParams {
    pub min_relationships: usize,
    pub min_bills_sponsored: i64,
    pub max_edges_per_node: usize,
    pub party: Option<String>,
}

impl Default for SimplifiedParams {
    fn default() -> Self {
        Self {
            min_relationships: 3,
            min_bills_sponsored: 1,
            max_edges_per_node: 20,
            party: None,
        }
    }
}

/// Keep the strongest edges, honouring the per-node edge cap
///
/// Edges are taken by bill count, strongest first; an edge is dropped when
/// either endpoint has already reached `max_edges_per_node`.
fn select_edges(mut edges: Vec<GroupedEdge>, min_relationships: usize, max_edges_per_node: usize) -> Vec<GroupedEdge> {
    // Stable sort keeps first-seen order among equal weights
    edges.sort_by(|a, b| b.bills.len().cmp(&a.bills.len()));

    let mut degree: HashMap<String, usize> = HashMap::new();
    let mut kept = Vec::new();
    for edge in edges {
        if edge.bills.len() < min_relationships {
            continue;
        }
        let source_degree = degree.get(&edge.source).copied().unwrap_or(0);
        let target_degree = degree.get(&edge.target).copied().unwrap_or(0);
        if source_degree >= max_edges_per_node || target_degree >= max_edges_per_node {
            continue;
        }
        *degree.entry(edge.source.clone()).or_default() += 1;
        *degree.entry(edge.target.clone()).or_default() += 1;
        kept.push(edge);
    }
    kept
}

/// GET /api/network/cosponsorship/simplified
pub async fn simplified_cosponsorship_network(
    State(state): State<AppState>,
    WithRejection(Query(params), _): WithRejection<Query<SimplifiedParams>, ApiError>,
) -> ApiResult<Json<NetworkGraph>> {
    let members = house_members(&state.db).await?;
    let counts = sponsored_counts(&state.db, true).await?;

    let nodes: Vec<NetworkNode> = members
        .iter()
        .filter(|m| party_matches(m.party.as_deref(), params.party.as_deref()))
        .filter_map(|m| {
            let sponsored = counts.get(&m.member_id_bioguide).copied().unwrap_or(0);
            (sponsored >= params.min_bills_sponsored).then(|| NetworkNode::from_member(m, sponsored))
        })
        .collect();
    let active: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let rows = house_cosponsorships(&state.db).await?;
    let edges = group_edges(
        rows.iter()
            .filter(|row| active.contains(row.sponsor.as_str()) && active.contains(row.cosponsor.as_str())),
    );

    let links = select_edges(edges, params.min_relationships, params.max_edges_per_node)
        .into_iter()
        .filter_map(NetworkLink::from_edge)
        .collect();

    Ok(Json(NetworkGraph { nodes, links }))
}

#[derive(Debug, Serialize)]
pub struct TargetMember {
    pub id: String,
    pub name: String,
    pub party: Option<String>,
    pub state: Option<String>,
    pub district: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MemberNetwork {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
    pub target_member: TargetMember,
}

/// GET /api/network/member/:id[?party=]
///
/// Direct sponsor/cosponsor neighbours of one member. The party filter
/// never removes the member at the centre.
pub async fn member_network(
    State(state): State<AppState>,
    WithRejection(Path(member_id), _): WithRejection<Path<String>, ApiError>,
    WithRejection(Query(filter), _): WithRejection<Query<PartyFilter>, ApiError>,
) -> ApiResult<Json<MemberNetwork>> {
    let target = sqlx::query_as::<_, NetworkMember>(
        "SELECT member_id_bioguide, first, last, party, state, district FROM members WHERE member_id_bioguide = ?",
    )
    .bind(&member_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Member {}", member_id)))?;

    let sql = format!(
        "{} AND (b.sponsor_bioguide = ? OR c.member_id_bioguide = ?) ORDER BY b.bill_id, c.id",
        COSPONSORSHIP_SELECT
    );
    let rows = sqlx::query_as::<_, CosponsorshipRow>(&sql)
        .bind(&member_id)
        .bind(&member_id)
        .fetch_all(&state.db)
        .await?;

    let mut involved: HashSet<String> = HashSet::from([member_id.clone()]);
    for row in &rows {
        involved.insert(row.sponsor.clone());
        involved.insert(row.cosponsor.clone());
    }

    let counts = sponsored_counts(&state.db, false).await?;
    let nodes: Vec<NetworkNode> = members_by_id(&state.db, &involved)
        .await?
        .iter()
        .filter(|m| m.member_id_bioguide == member_id || party_matches(m.party.as_deref(), filter.party.as_deref()))
        .map(|m| NetworkNode {
            is_target: Some(m.member_id_bioguide == member_id),
            ..NetworkNode::from_member(m, counts.get(&m.member_id_bioguide).copied().unwrap_or(0))
        })
        .collect();
    let in_graph: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let links = group_edges(&rows)
        .into_iter()
        .filter(|e| in_graph.contains(e.source.as_str()) && in_graph.contains(e.target.as_str()))
        .filter_map(NetworkLink::from_edge)
        .collect();

    let target_member = TargetMember {
        name: target.name(),
        id: target.member_id_bioguide,
        party: target.party,
        state: target.state,
        district: target.district,
    };

    Ok(Json(MemberNetwork {
        nodes,
        links,
        target_member,
    }))
}

#[derive(Debug, Serialize)]
pub struct CaucusInfo {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    pub color: String,
}

#[derive(Debug, Serialize)]
pub struct CaucusNode {
    pub id: String,
    pub label: String,
    pub title: String,
    pub color: String,
    pub size: u32,
    #[serde(rename = "borderWidth")]
    pub border_width: u32,
    pub party: Option<String>,
    pub state: Option<String>,
    pub district: Option<i64>,
    pub is_caucus_member: bool,
}

#[derive(Debug, Serialize)]
pub struct EdgeBill {
    pub id: String,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub bill_type: String,
    pub number: i64,
}

#[derive(Debug, Serialize)]
pub struct CaucusEdge {
    pub from: String,
    pub to: String,
    pub width: f64,
    pub value: usize,
    pub title: String,
    pub bills: Vec<EdgeBill>,
}

#[derive(Debug, Serialize)]
pub struct CaucusNetworkStats {
    pub caucus_members: usize,
    pub total_members: usize,
    pub relationships: usize,
}

#[derive(Debug, Serialize)]
pub struct CaucusNetwork {
    pub caucus: CaucusInfo,
    pub nodes: Vec<CaucusNode>,
    pub edges: Vec<CaucusEdge>,
    pub stats: CaucusNetworkStats,
}

/// Edge width grows with the number of shared bills, capped at 5
pub(crate) fn edge_width(count: usize) -> f64 {
    (1.0 + count as f64 * 0.5).min(5.0)
}

/// GET /api/caucus/:id/network
///
/// Active caucus members plus everyone they sponsor with or cosponsor for.
pub async fn caucus_network(
    State(state): State<AppState>,
    WithRejection(Path(caucus_id), _): WithRejection<Path<i64>, ApiError>,
) -> ApiResult<Json<CaucusNetwork>> {
    let caucus = get_caucus(&state.db, caucus_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Caucus {}", caucus_id)))?;
    let caucus_members = active_member_ids(&state.db, caucus_id).await?;

    let sql = format!("{} ORDER BY b.bill_id, c.id", COSPONSORSHIP_SELECT);
    let rows: Vec<CosponsorshipRow> = sqlx::query_as::<_, CosponsorshipRow>(&sql)
        .fetch_all(&state.db)
        .await?
        .into_iter()
        .filter(|row| caucus_members.contains(&row.sponsor) || caucus_members.contains(&row.cosponsor))
        .collect();

    let mut involved = caucus_members.clone();
    for row in &rows {
        involved.insert(row.sponsor.clone());
        involved.insert(row.cosponsor.clone());
    }

    let nodes: Vec<CaucusNode> = members_by_id(&state.db, &involved)
        .await?
        .into_iter()
        .map(|m| {
            let is_member = caucus_members.contains(&m.member_id_bioguide);
            let name = m.name();
            CaucusNode {
                title: format!(
                    "{} ({}-{})",
                    name,
                    m.party.as_deref().unwrap_or("?"),
                    m.state.as_deref().unwrap_or("?")
                ),
                color: if is_member {
                    caucus.color.clone()
                } else {
                    party_color(m.party.as_deref()).to_string()
                },
                size: if is_member { 25 } else { 15 },
                border_width: if is_member { 3 } else { 1 },
                label: name,
                id: m.member_id_bioguide,
                party: m.party,
                state: m.state,
                district: m.district,
                is_caucus_member: is_member,
            }
        })
        .collect();

    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut grouped: Vec<(String, String, Vec<&CosponsorshipRow>)> = Vec::new();
    for row in &rows {
        let slot = *index
            .entry((row.sponsor.clone(), row.cosponsor.clone()))
            .or_insert_with(|| {
                grouped.push((row.sponsor.clone(), row.cosponsor.clone(), Vec::new()));
                grouped.len() - 1
            });
        grouped[slot].2.push(row);
    }

    let edges: Vec<CaucusEdge> = grouped
        .into_iter()
        .map(|(from, to, bills)| CaucusEdge {
            width: edge_width(bills.len()),
            value: bills.len(),
            title: format!("{} sponsor/cosponsor relationship(s)", bills.len()),
            bills: bills
                .iter()
                .take(CAUCUS_EDGE_BILLS)
                .map(|row| EdgeBill {
                    id: row.bill_id.clone(),
                    title: row.title.clone(),
                    bill_type: row.bill_type.to_uppercase(),
                    number: row.number,
                })
                .collect(),
            from,
            to,
        })
        .collect();

    let stats = CaucusNetworkStats {
        caucus_members: caucus_members.len(),
        total_members: involved.len(),
        relationships: edges.len(),
    };

    Ok(Json(CaucusNetwork {
        caucus: CaucusInfo {
            id: caucus.id,
            name: caucus.name,
            short_name: caucus.short_name,
            color: caucus.color,
        },
        nodes,
        edges,
        stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(bill: &str, sponsor: &str, cosponsor: &str) -> CosponsorshipRow {
        CosponsorshipRow {
            bill_id: bill.to_string(),
            title: None,
            bill_type: "hr".to_string(),
            number: 1,
            sponsor: sponsor.to_string(),
            cosponsor: cosponsor.to_string(),
            date: None,
        }
    }

    #[test]
    fn test_party_colors() {
        assert_eq!(party_color(Some("D")), "#1f77b4");
        assert_eq!(party_color(Some("Democratic")), "#1f77b4");
        assert_eq!(party_color(Some("R")), "#d62728");
        assert_eq!(party_color(Some("I")), "#ff7f0e");
        assert_eq!(party_color(None), "#ff7f0e");
    }

    #[test]
    fn test_untitled_bill_label() {
        assert_eq!(row("hr1", "A", "B").bill_title(), "HR 1");
    }

    #[test]
    fn test_group_edges_is_directed() {
        let rows = [row("b1", "A", "B"), row("b2", "A", "B"), row("b3", "B", "A")];
        let edges = group_edges(&rows);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].bills.len(), 2);
        assert_eq!((edges[1].source.as_str(), edges[1].target.as_str()), ("B", "A"));
    }

    #[test]
    fn test_select_edges_applies_minimum_and_cap() {
        let rows = [
            row("b1", "A", "B"),
            row("b2", "A", "B"),
            row("b3", "A", "B"),
            row("b4", "A", "C"),
            row("b5", "A", "C"),
            row("b6", "C", "B"),
        ];
        let kept = select_edges(group_edges(&rows), 2, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].target, "B");

        let kept = select_edges(group_edges(&rows), 1, 20);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_edge_width_is_capped() {
        assert_eq!(edge_width(1), 1.5);
        assert_eq!(edge_width(4), 3.0);
        assert_eq!(edge_width(100), 5.0);
    }
}
