//! Row models for the congressional schema

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Member of Congress, keyed by Bioguide ID
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub member_id_bioguide: String,
    pub first: Option<String>,
    pub last: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
    /// NULL for senators
    pub district: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub dc_office: Option<String>,
}

impl Member {
    /// "First Last" display name
    pub fn display_name(&self) -> String {
        display_name(self.first.as_deref(), self.last.as_deref())
    }

    pub fn chamber_title(&self) -> &'static str {
        if self.district.is_some() {
            "House"
        } else {
            "Senate"
        }
    }
}

/// Join optional name parts, falling back to "Unknown"
pub fn display_name(first: Option<&str>, last: Option<&str>) -> String {
    let name = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    let name = name.trim();
    if name.is_empty() {
        "Unknown".to_string()
    } else {
        name.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Caucus {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CaucusMembership {
    pub id: i64,
    pub member_id_bioguide: String,
    pub caucus_id: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}
