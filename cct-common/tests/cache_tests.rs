//! Analysis cache and refresher against a file-backed store

mod common;

use cct_common::analysis::{AnalysisKind, Chamber};
use cct_common::cache::{AnalysisCache, CacheKey, CacheTtls};
use cct_common::config::RefreshTarget;
use cct_common::refresh::Refresher;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn ttls() -> CacheTtls {
    CacheTtls {
        analysis: Duration::from_secs(3600),
        bills: Duration::from_secs(60),
    }
}

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let key = CacheKey::new(AnalysisKind::Network, 119, Chamber::Senate);

    {
        let pool = common::open(dir.path()).await;
        let cache = AnalysisCache::new(pool.clone(), ttls());
        cache.put(&key, &json!({"edges": []}), Duration::from_secs(600)).await.unwrap();
        pool.close().await;
    }

    let pool = common::open(dir.path()).await;
    let cache = AnalysisCache::new(pool, ttls());
    let entry = cache.get(&key).await.unwrap().unwrap();
    assert!(entry.cached);
    assert_eq!(entry.payload, json!({"edges": []}));
}

#[tokio::test]
async fn test_corrupt_payload_is_recomputed() {
    let dir = TempDir::new().unwrap();
    let pool = common::open(dir.path()).await;
    let cache = AnalysisCache::new(pool.clone(), ttls());
    let key = CacheKey::new(AnalysisKind::Coalition, 119, Chamber::House);

    cache.put(&key, &json!({}), Duration::from_secs(600)).await.unwrap();
    sqlx::query("UPDATE analysis_cache SET payload = 'not json' WHERE cache_key = ?")
        .bind(key.to_string())
        .execute(&pool)
        .await
        .unwrap();
    assert!(cache.get(&key).await.is_err());

    let entry = cache
        .get_or_compute(&key, Duration::from_secs(600), || async { Ok(json!({"fresh": true})) })
        .await
        .unwrap();
    assert!(!entry.cached);
    assert_eq!(cache.get(&key).await.unwrap().unwrap().payload, json!({"fresh": true}));
}

#[tokio::test]
async fn test_refresh_all_populates_and_reports_counts() {
    let dir = TempDir::new().unwrap();
    let pool = common::open(dir.path()).await;
    common::seed_house(&pool).await;
    let cache = AnalysisCache::new(pool.clone(), ttls());

    // An expired leftover is purged at the end of the pass
    let stale = CacheKey::new(AnalysisKind::Network, 118, Chamber::House);
    cache.put(&stale, &json!({}), Duration::ZERO).await.unwrap();

    let refresher = Refresher::new(pool, cache.clone());
    let targets = vec![
        RefreshTarget { congress: 119, chamber: Chamber::House },
        RefreshTarget { congress: 119, chamber: Chamber::Senate },
    ];
    let reports = refresher.refresh_all(&targets).await;

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.succeeded()));
    assert_eq!(reports[0].members, Some(6));
    assert_eq!(reports[0].rollcalls, Some(common::ROLLCALLS as u64));
    assert_eq!(reports[0].cross_party_voters, Some(2));
    assert_eq!(reports[1].members, Some(1));

    let entries = cache.entries().await.unwrap();
    assert_eq!(entries.len(), 2 * AnalysisKind::ALL.len());
    assert!(entries.iter().all(|e| !e.expired));

    let bills = cache
        .get(&CacheKey::new(AnalysisKind::Bills, 119, Chamber::House))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bills.payload["count"], 2);
    assert_eq!(
        (bills.expires_at - bills.computed_at).num_seconds(),
        60,
        "bills listing uses its own TTL"
    );
}

#[tokio::test]
async fn test_caucus_invalidation_keeps_vote_reports() {
    let dir = TempDir::new().unwrap();
    let pool = common::open(dir.path()).await;
    common::seed_house(&pool).await;
    let cache = AnalysisCache::new(pool.clone(), ttls());
    Refresher::new(pool, cache.clone())
        .refresh_target(119, Chamber::House)
        .await;

    assert_eq!(cache.invalidate_caucus_dependent().await.unwrap(), 1);
    let ideology = CacheKey::new(AnalysisKind::Ideology, 119, Chamber::House);
    assert!(cache.get(&ideology).await.unwrap().is_none());
    let coalition = CacheKey::new(AnalysisKind::Coalition, 119, Chamber::House);
    assert!(cache.get(&coalition).await.unwrap().is_some());
}
