//! Caucus membership queries

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::models::{Caucus, CaucusMembership};
use crate::{Error, Result};

/// Caucuses that drive the per-member badges on the dashboard
const BADGE_CAUCUSES: [(&str, &str); 6] = [
    ("Freedom Caucus", "freedom_caucus"),
    ("Progressive Caucus", "progressive_caucus"),
    ("Blue Dog", "blue_dog_coalition"),
    ("CBC", "congressional_black_caucus"),
    ("MAGA", "maga_republicans"),
    ("TB", "true_blue_democrats"),
];

/// Active members of each badge caucus, by badge name
#[derive(Debug, Clone, Default)]
pub struct CaucusSets {
    sets: HashMap<&'static str, HashSet<String>>,
}

/// Badge booleans attached to member listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaucusFlags {
    pub is_freedom_caucus: bool,
    pub is_progressive_caucus: bool,
    pub is_blue_dog_coalition: bool,
    pub is_maga_republican: bool,
    pub is_congressional_black_caucus: bool,
    pub is_true_blue_democrat: bool,
}

impl CaucusSets {
    fn contains(&self, badge: &str, member_id: &str) -> bool {
        self.sets
            .get(badge)
            .map(|set| set.contains(member_id))
            .unwrap_or(false)
    }

    pub fn flags_for(&self, member_id: &str) -> CaucusFlags {
        CaucusFlags {
            is_freedom_caucus: self.contains("freedom_caucus", member_id),
            is_progressive_caucus: self.contains("progressive_caucus", member_id),
            is_blue_dog_coalition: self.contains("blue_dog_coalition", member_id),
            is_maga_republican: self.contains("maga_republicans", member_id),
            is_congressional_black_caucus: self.contains("congressional_black_caucus", member_id),
            is_true_blue_democrat: self.contains("true_blue_democrats", member_id),
        }
    }
}

/// Load active memberships of the badge caucuses
///
/// True Blue Democrats match on either short name 'TB' or the full name.
pub async fn load_caucus_sets(pool: &SqlitePool) -> Result<CaucusSets> {
    let rows: Vec<(String, String, String)> = sqlx::query_as(
        r#"
        SELECT c.short_name, c.name, cm.member_id_bioguide
        FROM caucus_memberships cm
        JOIN caucuses c ON c.id = cm.caucus_id
        WHERE cm.end_date IS NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut sets = CaucusSets::default();
    for (short_name, name, member_id) in rows {
        let badge = BADGE_CAUCUSES
            .iter()
            .find(|(short, _)| *short == short_name)
            .map(|(_, badge)| *badge)
            .or_else(|| (name == "True Blue Democrats").then_some("true_blue_democrats"));
        if let Some(badge) = badge {
            sets.sets.entry(badge).or_default().insert(member_id);
        }
    }

    Ok(sets)
}

/// Names of every active caucus each member belongs to
pub async fn active_caucus_names(pool: &SqlitePool) -> Result<BTreeMap<String, Vec<String>>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT cm.member_id_bioguide, c.name
        FROM caucus_memberships cm
        JOIN caucuses c ON c.id = cm.caucus_id
        WHERE cm.end_date IS NULL AND c.is_active = 1
        ORDER BY cm.member_id_bioguide, c.name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut names: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (member_id, name) in rows {
        names.entry(member_id).or_default().push(name);
    }
    Ok(names)
}

/// Caucus with its active member count
#[derive(Debug, Clone, Serialize)]
pub struct CaucusSummary {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub member_count: i64,
}

impl CaucusSummary {
    fn from_parts(caucus: Caucus, member_count: i64) -> Self {
        Self {
            id: caucus.id,
            name: caucus.name,
            short_name: caucus.short_name,
            description: caucus.description,
            color: caucus.color,
            icon: caucus.icon,
            member_count,
        }
    }
}

pub async fn get_caucus(pool: &SqlitePool, caucus_id: i64) -> Result<Option<Caucus>> {
    let caucus = sqlx::query_as::<_, Caucus>(
        "SELECT id, name, short_name, description, color, icon, is_active FROM caucuses WHERE id = ?",
    )
    .bind(caucus_id)
    .fetch_optional(pool)
    .await?;
    Ok(caucus)
}

async fn active_member_count(pool: &SqlitePool, caucus_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM caucus_memberships WHERE caucus_id = ? AND end_date IS NULL",
    )
    .bind(caucus_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// All active caucuses with member counts
pub async fn list_caucuses(pool: &SqlitePool) -> Result<Vec<CaucusSummary>> {
    let caucuses = sqlx::query_as::<_, Caucus>(
        "SELECT id, name, short_name, description, color, icon, is_active FROM caucuses WHERE is_active = 1 ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::with_capacity(caucuses.len());
    for caucus in caucuses {
        let count = active_member_count(pool, caucus.id).await?;
        summaries.push(CaucusSummary::from_parts(caucus, count));
    }
    Ok(summaries)
}

pub async fn caucus_summary(pool: &SqlitePool, caucus_id: i64) -> Result<Option<CaucusSummary>> {
    match get_caucus(pool, caucus_id).await? {
        Some(caucus) => {
            let count = active_member_count(pool, caucus.id).await?;
            Ok(Some(CaucusSummary::from_parts(caucus, count)))
        }
        None => Ok(None),
    }
}

/// Active member ids of one caucus
pub async fn active_member_ids(pool: &SqlitePool, caucus_id: i64) -> Result<HashSet<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT member_id_bioguide FROM caucus_memberships WHERE caucus_id = ? AND end_date IS NULL",
    )
    .bind(caucus_id)
    .fetch_all(pool)
    .await?;
    Ok(ids.into_iter().collect())
}

/// Start a membership; fails with `Conflict` if one is already active
pub async fn create_membership(
    pool: &SqlitePool,
    member_id: &str,
    caucus_id: i64,
    start_date: Option<NaiveDate>,
    notes: Option<&str>,
) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM caucus_memberships
        WHERE member_id_bioguide = ? AND caucus_id = ? AND end_date IS NULL
        "#,
    )
    .bind(member_id)
    .bind(caucus_id)
    .fetch_optional(pool)
    .await?;

    if existing.is_some() {
        return Err(Error::Conflict(
            "Member is already in this caucus".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO caucus_memberships (member_id_bioguide, caucus_id, start_date, notes)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(member_id)
    .bind(caucus_id)
    .bind(start_date)
    .bind(notes)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// End a membership by stamping its end date, returning the updated row
pub async fn end_membership(pool: &SqlitePool, membership_id: i64, end_date: NaiveDate) -> Result<CaucusMembership> {
    sqlx::query_as::<_, CaucusMembership>(
        r#"
        UPDATE caucus_memberships SET end_date = ?
        WHERE id = ?
        RETURNING id, member_id_bioguide, caucus_id, start_date, end_date, notes
        "#,
    )
    .bind(end_date)
    .bind(membership_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Membership {}", membership_id)))
}
