//! Persistent analysis cache
//!
//! Reports are stored as JSON in the `analysis_cache` table, keyed by
//! `"{kind}:{congress}:{chamber}"`, with a per-entry expiry. Entries are
//! replaced in place, so a refresh never leaves a window in which readers
//! see no entry.
//!
//! Computation is single-flight per key: concurrent misses for the same key
//! wait on one async lock and reuse the first result, while distinct keys
//! compute in parallel.

pub mod store;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisKind, Chamber};
use crate::config::CacheConfig;
use crate::db::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use crate::time::{from_ms, now_ms};
use crate::{Error, Result};

/// Identity of one cached report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: AnalysisKind,
    pub congress: u32,
    pub chamber: Chamber,
}

impl CacheKey {
    pub fn new(kind: AnalysisKind, congress: u32, chamber: Chamber) -> Self {
        Self { kind, congress, chamber }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.congress, self.chamber)
    }
}

impl FromStr for CacheKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(congress), Some(chamber)) => Ok(Self {
                kind: kind.parse()?,
                congress: congress
                    .parse()
                    .map_err(|_| Error::InvalidInput(format!("Invalid congress in cache key '{}'", s)))?,
                chamber: chamber.parse()?,
            }),
            _ => Err(Error::InvalidInput(format!("Malformed cache key '{}'", s))),
        }
    }
}

/// A report as served from (or just written to) the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnalysis {
    pub payload: serde_json::Value,
    /// True when the payload came from the store rather than a fresh computation
    pub cached: bool,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedAnalysis {
    fn from_row(row: store::CacheRow) -> Result<Self> {
        Ok(Self {
            payload: serde_json::from_str(&row.payload)?,
            cached: true,
            computed_at: from_ms(row.computed_at),
            expires_at: from_ms(row.expires_at),
        })
    }
}

/// One line of the cache status listing
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryStatus {
    pub key: String,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
    pub payload_bytes: i64,
}

/// Lifetimes per report family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub analysis: Duration,
    pub bills: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            analysis: Duration::from_secs(config.analysis_ttl_secs),
            bills: Duration::from_secs(config.bills_ttl_secs),
        }
    }
}

impl CacheTtls {
    pub fn for_kind(&self, kind: AnalysisKind) -> Duration {
        match kind {
            AnalysisKind::Bills => self.bills,
            _ => self.analysis,
        }
    }
}

type KeyLock = Arc<Mutex<()>>;
type LockMap = Arc<StdMutex<HashMap<String, KeyLock>>>;

/// Invalidation counter per report kind, indexed by `kind as usize`
type Generations = [u64; AnalysisKind::ALL.len()];

fn lock_map(locks: &StdMutex<HashMap<String, KeyLock>>) -> MutexGuard<'_, HashMap<String, KeyLock>> {
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds one key's single-flight lock
///
/// Dropping the lease (including when the owning future is cancelled)
/// releases the lock and unregisters the key once nobody else holds it.
pub(crate) struct KeyLease {
    locks: LockMap,
    name: String,
    lock: KeyLock,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = lock_map(&self.locks);
        let registered = locks.get(&self.name).is_some_and(|current| Arc::ptr_eq(current, &self.lock));
        // Only the map and this lease remain: nobody is waiting on the key
        if registered && Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.name);
        }
    }
}

/// Cache front shared by the web tier and the refresher
#[derive(Clone)]
pub struct AnalysisCache {
    pool: SqlitePool,
    ttls: CacheTtls,
    locks: LockMap,
    /// Writers of computed reports hold a read guard; invalidation holds the
    /// write guard while it bumps the counter and deletes rows
    generations: Arc<RwLock<Generations>>,
}

impl AnalysisCache {
    pub fn new(pool: SqlitePool, ttls: CacheTtls) -> Self {
        Self {
            pool,
            ttls,
            locks: Arc::new(StdMutex::new(HashMap::new())),
            generations: Arc::new(RwLock::new([0; AnalysisKind::ALL.len()])),
        }
    }

    pub fn ttl_for(&self, kind: AnalysisKind) -> Duration {
        self.ttls.for_kind(kind)
    }

    /// Unexpired entry for `key`
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CachedAnalysis>> {
        match store::load_fresh(&self.pool, key, now_ms()).await? {
            Some(row) => Ok(Some(CachedAnalysis::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Store `payload` under `key`, replacing any previous entry
    pub async fn put(&self, key: &CacheKey, payload: &serde_json::Value, ttl: Duration) -> Result<CachedAnalysis> {
        let text = serde_json::to_string(payload)?;
        let computed_at = now_ms();
        let expires_at = computed_at.saturating_add(ttl.as_millis() as i64);

        let pool = &self.pool;
        let text = text.as_str();
        retry_on_lock("analysis cache write", DEFAULT_MAX_LOCK_WAIT_MS, move || {
            store::upsert(pool, key, text, computed_at, expires_at)
        })
        .await?;

        debug!(key = %key, bytes = text.len(), "Cached analysis");

        Ok(CachedAnalysis {
            payload: payload.clone(),
            cached: false,
            computed_at: from_ms(computed_at),
            expires_at: from_ms(expires_at),
        })
    }

    async fn generation(&self, kind: AnalysisKind) -> u64 {
        self.generations.read().await[kind as usize]
    }

    /// Store a computed payload unless its kind was invalidated after
    /// `generation` was read
    ///
    /// A discarded payload is still returned to the caller, uncached.
    async fn store_computed(
        &self,
        key: &CacheKey,
        payload: serde_json::Value,
        ttl: Duration,
        generation: u64,
    ) -> Result<CachedAnalysis> {
        let generations = self.generations.read().await;
        if generations[key.kind as usize] != generation {
            info!(key = %key, "Invalidated during computation, result not cached");
            let now = from_ms(now_ms());
            return Ok(CachedAnalysis {
                payload,
                cached: false,
                computed_at: now,
                expires_at: now,
            });
        }
        self.put(key, &payload, ttl).await
    }

    /// Read failures degrade to a miss
    async fn lookup(&self, key: &CacheKey) -> Option<CachedAnalysis> {
        match self.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, "Cache read failed, recomputing: {}", e);
                None
            }
        }
    }

    /// Serve from the cache, computing and storing on a miss
    ///
    /// A failed computation leaves the cache untouched and returns its error.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, ttl: Duration, compute: F) -> Result<CachedAnalysis>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value>>,
    {
        if let Some(entry) = self.lookup(key).await {
            debug!(key = %key, "Cache hit");
            return Ok(entry);
        }

        let _lease = self.acquire(key).await;
        // Another caller may have filled the entry while we waited
        if let Some(entry) = self.lookup(key).await {
            return Ok(entry);
        }

        debug!(key = %key, "Cache miss, computing");
        let generation = self.generation(key.kind).await;
        let payload = compute().await?;
        self.store_computed(key, payload, ttl, generation).await
    }

    /// Recompute unconditionally and replace the entry
    pub async fn refresh<F, Fut>(&self, key: &CacheKey, ttl: Duration, compute: F) -> Result<CachedAnalysis>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value>>,
    {
        let _lease = self.acquire(key).await;
        let generation = self.generation(key.kind).await;
        let payload = compute().await?;
        self.store_computed(key, payload, ttl, generation).await
    }

    pub async fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        let mut generations = self.generations.write().await;
        generations[key.kind as usize] += 1;
        let removed = store::delete(&self.pool, key).await?;
        if removed {
            info!(key = %key, "Invalidated cache entry");
        }
        Ok(removed)
    }

    /// Drop every report that embeds caucus membership
    ///
    /// Computations of those reports already in flight are not cached.
    pub async fn invalidate_caucus_dependent(&self) -> Result<u64> {
        let mut generations = self.generations.write().await;
        let mut removed = 0;
        for kind in AnalysisKind::ALL.into_iter().filter(AnalysisKind::depends_on_caucuses) {
            generations[kind as usize] += 1;
            removed += store::delete_kind(&self.pool, kind.key_segment()).await?;
        }
        if removed > 0 {
            info!(removed, "Invalidated caucus-dependent cache entries");
        }
        Ok(removed)
    }

    /// Remove every entry, returning how many were removed
    pub async fn clear(&self) -> Result<u64> {
        let mut generations = self.generations.write().await;
        for generation in generations.iter_mut() {
            *generation += 1;
        }
        let removed = store::delete_all(&self.pool).await?;
        info!(removed, "Cleared analysis cache");
        Ok(removed)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = store::delete_expired(&self.pool, now_ms()).await?;
        if removed > 0 {
            info!(removed, "Purged expired cache entries");
        }
        Ok(removed)
    }

    pub async fn entries(&self) -> Result<Vec<CacheEntryStatus>> {
        let now = now_ms();
        let rows = store::list(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(key, computed_at, expires_at, payload_bytes)| CacheEntryStatus {
                key,
                computed_at: from_ms(computed_at),
                expires_at: from_ms(expires_at),
                expired: expires_at <= now,
                payload_bytes,
            })
            .collect())
    }

    pub(crate) async fn acquire(&self, key: &CacheKey) -> KeyLease {
        let name = key.to_string();
        let lock = lock_map(&self.locks).entry(name.clone()).or_default().clone();
        let mut lease = KeyLease {
            locks: self.locks.clone(),
            name,
            lock,
            guard: None,
        };
        lease.guard = Some(lease.lock.clone().lock_owned().await);
        lease
    }
}
