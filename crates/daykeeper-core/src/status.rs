//! Day-status engine: the deterministic, auditable definition of an
//! "honored" day, derived from the event index and the check-in ledger.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::DatabaseError;
use crate::storage::Database;

/// Fixed daily prompts counted toward the requirement: morning, run,
/// winddown. The events_list prompt is informational and never counted.
pub const REQUIRED_DAILY: u32 = 3;

/// Derived (never persisted) verdict for one (user, day).
#[derive(Debug, Clone, Serialize)]
pub struct DayStatus {
    pub day: NaiveDate,
    pub required_events: u32,
    pub required_total: u32,
    pub completed_daily: u32,
    pub completed_event_photos: u32,
    pub completed_total: u32,
    pub misses: u32,
    pub allowed_misses: u32,
    pub honored: bool,
}

/// Pure core of the verdict; the DB wrapper only gathers the counts.
pub fn day_status_from_counts(
    day: NaiveDate,
    required_events: u32,
    completed_daily: u32,
    completed_event_photos: u32,
    allowed_misses: u32,
) -> DayStatus {
    let required_total = REQUIRED_DAILY + required_events;
    let completed_total = completed_daily + completed_event_photos;
    let misses = required_total.saturating_sub(completed_total);
    DayStatus {
        day,
        required_events,
        required_total,
        completed_daily,
        completed_event_photos,
        completed_total,
        misses,
        allowed_misses,
        honored: misses <= allowed_misses,
    }
}

/// Compute the status of (user, day). Pure read; re-evaluable at any time,
/// mid-day included (misses are simply higher before prompts have fired).
pub fn compute_day_status(
    db: &Database,
    user_id: i64,
    day: NaiveDate,
    allowed_misses: u32,
) -> Result<DayStatus, DatabaseError> {
    let required_events = db.required_event_count(user_id, day)?;
    let completed_daily = db.count_completed_daily(user_id, day)?;
    let completed_event_photos = db.count_completed_event_photos(user_id, day)?;
    Ok(day_status_from_counts(
        day,
        required_events,
        completed_daily,
        completed_event_photos,
        allowed_misses,
    ))
}

/// One-line summary used by the morning/winddown messages and the status
/// query.
pub fn format_status_line(st: &DayStatus) -> String {
    let misses_left = st.allowed_misses.saturating_sub(st.misses);
    format!(
        "Status: {}/{} done (misses {}, left {}). Honored today: {}",
        st.completed_total,
        st.required_total,
        st.misses,
        misses_left,
        if st.honored { "YES" } else { "NO" }
    )
}
