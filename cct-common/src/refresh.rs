//! Scheduled recomputation of cached reports
//!
//! A pass recomputes every [`AnalysisKind`] for each configured target and
//! replaces the cache entries in place, then purges expired rows. The web
//! server runs passes on an interval; `cct-refresh` runs them standalone.

use serde::Serialize;
use sqlx::SqlitePool;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::analysis::{self, AnalysisKind, Chamber};
use crate::cache::{AnalysisCache, CacheKey};
use crate::config::RefreshTarget;
use crate::time::today;

/// Result of recomputing one report
#[derive(Debug, Clone, Serialize)]
pub struct KindOutcome {
    pub kind: AnalysisKind,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Result of one target's refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub congress: u32,
    pub chamber: Chamber,
    pub outcomes: Vec<KindOutcome>,
    pub members: Option<u64>,
    pub rollcalls: Option<u64>,
    pub cross_party_voters: Option<u64>,
    pub duration_ms: u64,
}

impl RefreshReport {
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &KindOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

/// Pull the headline counts out of a coalition report
fn coalition_counts(payload: &serde_json::Value) -> (Option<u64>, Option<u64>, Option<u64>) {
    let members = payload.pointer("/summary/total_members").and_then(|v| v.as_u64());
    let rollcalls = payload.pointer("/summary/total_rollcalls").and_then(|v| v.as_u64());
    let cross_party = payload
        .pointer("/member_analysis/cross_party_voters")
        .and_then(|v| v.as_array())
        .map(|voters| voters.len() as u64);
    (members, rollcalls, cross_party)
}

#[derive(Clone)]
pub struct Refresher {
    pool: SqlitePool,
    cache: AnalysisCache,
}

impl Refresher {
    pub fn new(pool: SqlitePool, cache: AnalysisCache) -> Self {
        Self { pool, cache }
    }

    /// Recompute every report for one (congress, chamber)
    pub async fn refresh_target(&self, congress: u32, chamber: Chamber) -> RefreshReport {
        let started = Instant::now();
        let day = today();
        info!("Refreshing analysis cache for {} {}", congress, chamber);

        let mut report = RefreshReport {
            congress,
            chamber,
            outcomes: Vec::with_capacity(AnalysisKind::ALL.len()),
            members: None,
            rollcalls: None,
            cross_party_voters: None,
            duration_ms: 0,
        };

        for kind in AnalysisKind::ALL {
            let kind_started = Instant::now();
            let key = CacheKey::new(kind, congress, chamber);
            let pool = &self.pool;
            let result = self
                .cache
                .refresh(&key, self.cache.ttl_for(kind), || analysis::compute(pool, kind, congress, chamber, day))
                .await;

            let outcome = match result {
                Ok(entry) => {
                    if kind == AnalysisKind::Coalition {
                        let (members, rollcalls, cross_party) = coalition_counts(&entry.payload);
                        report.members = members;
                        report.rollcalls = rollcalls;
                        report.cross_party_voters = cross_party;
                    }
                    KindOutcome {
                        kind,
                        success: true,
                        error: None,
                        duration_ms: kind_started.elapsed().as_millis() as u64,
                    }
                }
                Err(e) => {
                    error!("Refresh of {} failed: {}", key, e);
                    KindOutcome {
                        kind,
                        success: false,
                        error: Some(e.to_string()),
                        duration_ms: kind_started.elapsed().as_millis() as u64,
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        if report.succeeded() {
            info!(
                members = report.members.unwrap_or(0),
                rollcalls = report.rollcalls.unwrap_or(0),
                cross_party_voters = report.cross_party_voters.unwrap_or(0),
                duration_ms = report.duration_ms,
                "Refreshed {} {}",
                congress,
                chamber
            );
        } else {
            warn!(
                failed = report.failures().count(),
                duration_ms = report.duration_ms,
                "Refresh of {} {} finished with failures",
                congress,
                chamber
            );
        }
        report
    }

    /// Refresh targets one after another, then purge expired entries
    pub async fn refresh_all(&self, targets: &[RefreshTarget]) -> Vec<RefreshReport> {
        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            reports.push(self.refresh_target(target.congress, target.chamber).await);
        }

        if let Err(e) = self.cache.purge_expired().await {
            warn!("Purging expired cache entries failed: {}", e);
        }
        reports
    }

    /// Run a pass immediately, then every `interval`, until cancelled
    pub async fn run_periodic(self, targets: Vec<RefreshTarget>, interval: Duration, cancel: CancellationToken) {
        info!(
            "Refresh scheduler started: {} target(s) every {}s",
            targets.len(),
            interval.as_secs()
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // Abandoning a pass leaves the entries it has not reached untouched
                    let reports = tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Refresh pass interrupted by shutdown");
                            break;
                        }
                        reports = self.refresh_all(&targets) => reports,
                    };
                    let failed = reports.iter().filter(|r| !r.succeeded()).count();
                    if failed > 0 {
                        warn!("Refresh pass completed with {} failed target(s)", failed);
                    }
                }
            }
        }

        info!("Refresh scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTtls;
    use crate::db::init::init_memory_database;
    use serde_json::json;

    #[test]
    fn test_coalition_counts() {
        let payload = json!({
            "summary": {"total_members": 3, "total_rollcalls": 12},
            "member_analysis": {"cross_party_voters": [{}, {}]}
        });
        assert_eq!(coalition_counts(&payload), (Some(3), Some(12), Some(2)));
        assert_eq!(coalition_counts(&json!({})), (None, None, None));
    }

    #[tokio::test]
    async fn test_refresh_on_empty_store_fills_every_kind() {
        let pool = init_memory_database().await.unwrap();
        let cache = AnalysisCache::new(pool.clone(), CacheTtls::default());
        let refresher = Refresher::new(pool, cache.clone());

        let report = refresher.refresh_target(119, Chamber::House).await;
        assert!(report.succeeded(), "{:?}", report.outcomes);
        assert_eq!(report.outcomes.len(), AnalysisKind::ALL.len());
        assert_eq!(report.members, Some(0));
        assert_eq!(report.cross_party_voters, Some(0));

        for kind in AnalysisKind::ALL {
            let key = CacheKey::new(kind, 119, Chamber::House);
            assert!(cache.get(&key).await.unwrap().is_some(), "missing {}", key);
        }
    }

    #[tokio::test]
    async fn test_cancelled_scheduler_exits() {
        let pool = init_memory_database().await.unwrap();
        let cache = AnalysisCache::new(pool.clone(), CacheTtls::default());
        let refresher = Refresher::new(pool, cache);

        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(
            Duration::from_secs(5),
            refresher.run_periodic(Vec::new(), Duration::from_secs(3600), cancel),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_interrupts_running_pass() {
        let pool = init_memory_database().await.unwrap();
        let cache = AnalysisCache::new(pool.clone(), CacheTtls::default());
        let refresher = Refresher::new(pool, cache.clone());

        // Hold the first report's key so the pass blocks inside refresh_target
        let lease = cache
            .acquire(&CacheKey::new(AnalysisKind::Coalition, 119, Chamber::House))
            .await;

        let cancel = CancellationToken::new();
        let targets = vec![RefreshTarget {
            congress: 119,
            chamber: Chamber::House,
        }];
        let handle = tokio::spawn(refresher.run_periodic(targets, Duration::from_secs(3600), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler kept running after cancel")
            .unwrap();
        drop(lease);
    }
}
