//! `analysis_cache` table access

use sqlx::SqlitePool;

use super::CacheKey;
use crate::Result;

/// Raw cache row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CacheRow {
    pub cache_key: String,
    pub kind: String,
    pub congress: i64,
    pub chamber: String,
    pub payload: String,
    pub computed_at: i64,
    pub expires_at: i64,
}

/// Fetch an entry that has not expired at `now_ms`
pub async fn load_fresh(pool: &SqlitePool, key: &CacheKey, now_ms: i64) -> Result<Option<CacheRow>> {
    let row = sqlx::query_as::<_, CacheRow>(
        r#"
        SELECT cache_key, kind, congress, chamber, payload, computed_at, expires_at
        FROM analysis_cache
        WHERE cache_key = ? AND expires_at > ?
        "#,
    )
    .bind(key.to_string())
    .bind(now_ms)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Insert or replace an entry in a single statement
pub async fn upsert(
    pool: &SqlitePool,
    key: &CacheKey,
    payload: &str,
    computed_at: i64,
    expires_at: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO analysis_cache (cache_key, kind, congress, chamber, payload, computed_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(cache_key) DO UPDATE SET
            payload = excluded.payload,
            computed_at = excluded.computed_at,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(key.to_string())
    .bind(key.kind.key_segment())
    .bind(key.congress as i64)
    .bind(key.chamber.as_str())
    .bind(payload)
    .bind(computed_at)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete(pool: &SqlitePool, key: &CacheKey) -> Result<bool> {
    let result = sqlx::query("DELETE FROM analysis_cache WHERE cache_key = ?")
        .bind(key.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_kind(pool: &SqlitePool, kind: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM analysis_cache WHERE kind = ?")
        .bind(kind)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM analysis_cache").execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn delete_expired(pool: &SqlitePool, now_ms: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM analysis_cache WHERE expires_at <= ?")
        .bind(now_ms)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Every entry, expired or not, with payload size instead of payload
pub async fn list(pool: &SqlitePool) -> Result<Vec<(String, i64, i64, i64)>> {
    let rows = sqlx::query_as(
        r#"
        SELECT cache_key, computed_at, expires_at, LENGTH(payload)
        FROM analysis_cache
        ORDER BY cache_key
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
