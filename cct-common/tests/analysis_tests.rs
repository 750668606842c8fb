//! End-to-end report computation over a seeded file database

mod common;

use cct_common::analysis::{compute, AnalysisKind, Chamber};
use cct_common::db::caucus::{create_membership, list_caucuses};
use chrono::NaiveDate;
use serde_json::Value;
use tempfile::TempDir;

fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

async fn report(kind: AnalysisKind) -> Value {
    let dir = TempDir::new().unwrap();
    let pool = common::open(dir.path()).await;
    common::seed_house(&pool).await;
    compute(&pool, kind, 119, Chamber::House, june_first()).await.unwrap()
}

#[tokio::test]
async fn test_coalition_report_summary_and_votes() {
    let report = report(AnalysisKind::Coalition).await;

    assert_eq!(report["analysis_metadata"]["congress"], 119);
    assert_eq!(report["analysis_metadata"]["chamber"], "house");
    assert_eq!(report["analysis_metadata"]["start_date"], "2025-01-02");
    assert_eq!(report["summary"]["total_members"], 6);
    assert_eq!(report["summary"]["total_rollcalls"], common::ROLLCALLS);
    assert_eq!(report["summary"]["total_votes"], 72);

    // 3-0 Democrats against 1-2 Republicans, except the first roll call at 2-1
    let partisan = report["voting_analysis"]["most_partisan_votes"].as_array().unwrap();
    assert_eq!(partisan.len(), 10);
    assert_eq!(partisan[0]["rollcall_id"], "rc-119-house-02");
    let bipartisan = report["voting_analysis"]["most_bipartisan_votes"].as_array().unwrap();
    assert_eq!(bipartisan[0]["rollcall_id"], "rc-119-house-01");
    assert_eq!(bipartisan[0]["bill_title"], "Infrastructure Act");

    let cross = report["member_analysis"]["cross_party_voters"].as_array().unwrap();
    let ids: Vec<&str> = cross.iter().map(|v| v["member_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["R3", "D3"]);
    assert_eq!(cross[0]["cross_party_percentage"], 100.0);

    let stats = &report["member_analysis"]["voting_statistics"]["R1"];
    assert_eq!(stats["nay_votes"], 12);
    assert_eq!(stats["yea_percentage"], 0.0);
}

#[tokio::test]
async fn test_ideology_labels_and_caucuses() {
    let dir = TempDir::new().unwrap();
    let pool = common::open(dir.path()).await;
    common::seed_house(&pool).await;
    let tb = list_caucuses(&pool)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.short_name == "TB")
        .unwrap();
    create_membership(&pool, "D1", tb.id, None, None).await.unwrap();

    let report = compute(&pool, AnalysisKind::Ideology, 119, Chamber::House, june_first())
        .await
        .unwrap();

    assert_eq!(report["total_members"], 6);
    let profiles = &report["profiles"];
    assert_eq!(profiles["D1"]["primary_label"], "True Blue Democrat");
    assert_eq!(profiles["D1"]["caucuses"][0], "True Blue Democrats");
    assert_eq!(profiles["R1"]["primary_label"], "MAGA Republican");
    assert_eq!(profiles["R3"]["primary_label"], "Cross-Party Republican");
    assert_eq!(profiles["R3"]["party_line_percentage"], 0.0);
    assert!(profiles.get("S1").is_none());

    assert_eq!(report["label_distribution"]["MAGA Republican"], 2);
}

#[tokio::test]
async fn test_network_report_edges() {
    let report = report(AnalysisKind::Network).await;

    assert_eq!(report["node_count"], 6);
    assert_eq!(report["edge_count"], 7);
    let cross_party = report["edges"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["cross_party"] == true)
        .count();
    assert_eq!(cross_party, 3);
}

#[tokio::test]
async fn test_coalitions_group_r3_with_democrats() {
    let report = report(AnalysisKind::Coalitions).await;

    let coalitions = report["coalitions"].as_array().unwrap();
    assert_eq!(coalitions.len(), 2);
    assert_eq!(coalitions[0]["id"], 1);
    assert_eq!(coalitions[0]["size"], 4);
    assert_eq!(coalitions[0]["bipartisan"], true);
    let members: Vec<&str> = coalitions[0]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap())
        .collect();
    assert_eq!(members, vec!["D1", "D2", "D3", "R3"]);
    assert_eq!(coalitions[1]["bipartisan"], false);
    assert_eq!(report["total_members"], 6);
}

#[tokio::test]
async fn test_bills_listing_orders_by_latest_action() {
    let report = report(AnalysisKind::Bills).await;

    assert_eq!(report["count"], 2);
    let bills = report["bills"].as_array().unwrap();
    assert_eq!(bills[0]["id"], "hr2-119");
    assert_eq!(bills[0]["last_action_code"], "H30000");
    assert_eq!(bills[0]["type"], "HR");
    assert_eq!(bills[0]["chamber"], "House");
    assert_eq!(bills[1]["sponsor"], "Ana Álvarez");
    assert_eq!(bills[1]["cosponsor_count"], 2);
}

#[tokio::test]
async fn test_rollcalls_outside_window_are_ignored() {
    let dir = TempDir::new().unwrap();
    let pool = common::open(dir.path()).await;
    common::seed_house(&pool).await;

    // Window for February 2025 ends before any roll call
    let february = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
    let report = compute(&pool, AnalysisKind::Coalition, 119, Chamber::House, february)
        .await
        .unwrap();
    assert_eq!(report["summary"]["total_rollcalls"], 0);
    assert_eq!(report["summary"]["total_members"], 6);
}
