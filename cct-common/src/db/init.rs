//! Database initialization
//!
//! Creates the congressional schema on first run and opens it on later runs.
//! Every statement is idempotent, so services and the refresh job can all
//! call [`init_database`] at startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the web tier keep reading while a refresh writes cache rows
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open an in-memory database with the full schema (tests and tooling)
///
/// Limited to one connection: every pooled connection to `sqlite::memory:`
/// would otherwise see its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every table, index and default row
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_members_table(pool).await?;
    create_bills_table(pool).await?;
    create_bill_subjects_table(pool).await?;
    create_cosponsors_table(pool).await?;
    create_actions_table(pool).await?;
    create_amendments_table(pool).await?;
    create_rollcalls_table(pool).await?;
    create_votes_table(pool).await?;
    create_caucus_tables(pool).await?;
    create_analysis_cache_table(pool).await?;
    create_indexes(pool).await?;
    init_default_caucuses(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_members_table(pool: &SqlitePool) -> Result<()> {
    // district is NULL for senators
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS members (
            member_id_bioguide TEXT PRIMARY KEY,
            icpsr INTEGER,
            lis_id TEXT,
            first TEXT,
            last TEXT,
            party TEXT,
            state TEXT,
            district INTEGER,
            start_date DATE,
            end_date DATE,
            email TEXT,
            phone TEXT,
            website TEXT,
            dc_office TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_bills_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bills (
            bill_id TEXT PRIMARY KEY,
            congress INTEGER NOT NULL,
            chamber TEXT NOT NULL,
            number INTEGER NOT NULL,
            type TEXT NOT NULL,
            title TEXT,
            introduced_date DATE,
            sponsor_bioguide TEXT REFERENCES members(member_id_bioguide),
            policy_area TEXT,
            summary_short TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_bill_subjects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bill_subjects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_id TEXT NOT NULL REFERENCES bills(bill_id) ON DELETE CASCADE,
            subject_term TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cosponsors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cosponsors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_id TEXT NOT NULL REFERENCES bills(bill_id) ON DELETE CASCADE,
            member_id_bioguide TEXT NOT NULL REFERENCES members(member_id_bioguide),
            date DATE NOT NULL,
            is_original INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_actions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS actions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_id TEXT NOT NULL REFERENCES bills(bill_id) ON DELETE CASCADE,
            action_date DATE NOT NULL,
            action_code TEXT NOT NULL,
            text TEXT,
            committee_code TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_amendments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS amendments (
            amendment_id TEXT PRIMARY KEY,
            bill_id TEXT NOT NULL REFERENCES bills(bill_id) ON DELETE CASCADE,
            sponsor_bioguide TEXT REFERENCES members(member_id_bioguide),
            type TEXT,
            purpose TEXT,
            introduced_date DATE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_rollcalls_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rollcalls (
            rollcall_id TEXT PRIMARY KEY,
            congress INTEGER NOT NULL,
            chamber TEXT NOT NULL,
            session INTEGER NOT NULL,
            rc_number INTEGER NOT NULL,
            date DATE NOT NULL,
            question TEXT,
            bill_id TEXT REFERENCES bills(bill_id),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_votes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rollcall_id TEXT NOT NULL REFERENCES rollcalls(rollcall_id) ON DELETE CASCADE,
            member_id_bioguide TEXT NOT NULL REFERENCES members(member_id_bioguide),
            vote_code TEXT NOT NULL CHECK (vote_code IN ('Yea', 'Nay', 'Present', 'Not Voting')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (rollcall_id, member_id_bioguide)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_caucus_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS caucuses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            short_name TEXT NOT NULL UNIQUE,
            description TEXT,
            color TEXT NOT NULL DEFAULT '#6c757d',
            icon TEXT NOT NULL DEFAULT 'fas fa-users',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATE NOT NULL DEFAULT CURRENT_DATE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // end_date NULL means the membership is current
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS caucus_memberships (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id_bioguide TEXT NOT NULL REFERENCES members(member_id_bioguide),
            caucus_id INTEGER NOT NULL REFERENCES caucuses(id),
            start_date DATE,
            end_date DATE,
            notes TEXT,
            created_at DATE NOT NULL DEFAULT CURRENT_DATE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Persistent store behind [`crate::cache::AnalysisCache`]
///
/// Timestamps are Unix milliseconds.
async fn create_analysis_cache_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_cache (
            cache_key TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            congress INTEGER NOT NULL,
            chamber TEXT NOT NULL,
            payload TEXT NOT NULL,
            computed_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_bills_congress_chamber ON bills(congress, chamber)",
        "CREATE INDEX IF NOT EXISTS idx_bills_sponsor ON bills(sponsor_bioguide)",
        "CREATE INDEX IF NOT EXISTS idx_bills_introduced ON bills(introduced_date)",
        "CREATE INDEX IF NOT EXISTS idx_bill_subjects_bill ON bill_subjects(bill_id)",
        "CREATE INDEX IF NOT EXISTS idx_cosponsors_bill ON cosponsors(bill_id)",
        "CREATE INDEX IF NOT EXISTS idx_cosponsors_member ON cosponsors(member_id_bioguide)",
        "CREATE INDEX IF NOT EXISTS idx_actions_bill_date ON actions(bill_id, action_date)",
        "CREATE INDEX IF NOT EXISTS idx_votes_rollcall ON votes(rollcall_id)",
        "CREATE INDEX IF NOT EXISTS idx_votes_member ON votes(member_id_bioguide)",
        "CREATE INDEX IF NOT EXISTS idx_rollcalls_congress_chamber ON rollcalls(congress, chamber)",
        "CREATE INDEX IF NOT EXISTS idx_rollcalls_date ON rollcalls(date)",
        "CREATE INDEX IF NOT EXISTS idx_rollcalls_bill ON rollcalls(bill_id)",
        "CREATE INDEX IF NOT EXISTS idx_members_party_state ON members(party, state)",
        "CREATE INDEX IF NOT EXISTS idx_caucus_memberships_member ON caucus_memberships(member_id_bioguide)",
        "CREATE INDEX IF NOT EXISTS idx_caucus_memberships_caucus ON caucus_memberships(caucus_id, end_date)",
        "CREATE INDEX IF NOT EXISTS idx_analysis_cache_expires ON analysis_cache(expires_at)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Caucuses the dashboard badges are keyed on
///
/// Inserted once; later edits to these rows are preserved.
async fn init_default_caucuses(pool: &SqlitePool) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM caucuses")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let defaults = [
        ("Freedom Caucus", "Freedom Caucus", "Conservative Republican caucus", "#dc3545", "fas fa-flag"),
        ("Progressive Caucus", "Progressive Caucus", "Progressive Democratic caucus", "#0d6efd", "fas fa-star"),
        ("Blue Dog Coalition", "Blue Dog", "Moderate Democratic caucus", "#0dcaf0", "fas fa-dog"),
        ("Congressional Black Caucus", "CBC", "African American members of Congress", "#000000", "fas fa-users"),
        ("MAGA Republicans", "MAGA", "Republicans aligned with the MAGA movement", "#b22222", "fas fa-hat-cowboy"),
        ("True Blue Democrats", "TB", "Liberal Democratic caucus", "#007bff", "fas fa-heart"),
    ];

    for (name, short_name, description, color, icon) in defaults {
        sqlx::query(
            "INSERT OR IGNORE INTO caucuses (name, short_name, description, color, icon) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(short_name)
        .bind(description)
        .bind(color)
        .bind(icon)
        .execute(pool)
        .await?;
    }

    info!("Default caucuses inserted");
    Ok(())
}
