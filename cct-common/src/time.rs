//! Timestamp and congress calendar utilities

use chrono::{DateTime, NaiveDate, Utc};

use crate::{Error, Result};

/// First congress convened in 1789; each congress spans two years.
const FIRST_CONGRESS_YEAR: i32 = 1789;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time as milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Today's date (UTC)
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Convert a millisecond timestamp back to a UTC datetime
///
/// Out-of-range values clamp to the Unix epoch.
pub fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

/// Date a congress convenes (January 3 of its first year)
///
/// The 119th Congress convened on 2025-01-03. `None` for congress 0 and for
/// congresses whose year is outside the calendar range.
pub fn congress_start_date(congress: u32) -> Option<NaiveDate> {
    let offset = i32::try_from(congress.checked_sub(1)?).ok()?.checked_mul(2)?;
    let year = FIRST_CONGRESS_YEAR.checked_add(offset)?;
    NaiveDate::from_ymd_opt(year, 1, 3)
}

/// Start date of a congress that has convened by `today`
pub fn convened_congress_start(congress: u32, today: NaiveDate) -> Result<NaiveDate> {
    match congress_start_date(congress) {
        Some(start) if start <= today => Ok(start),
        Some(start) => Err(Error::InvalidInput(format!(
            "Congress {} has not convened yet (starts {})",
            congress, start
        ))),
        None => Err(Error::InvalidInput(format!("Congress {} is out of range", congress))),
    }
}
