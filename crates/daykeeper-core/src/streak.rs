//! Streak engine: walks backward over day statuses to produce the current
//! and best honored runs.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::DatabaseError;
use crate::status::compute_day_status;
use crate::storage::Database;

/// Scan bound. Keeps the cost constant regardless of account age; `best`
/// is therefore "best within the last year", not all-time.
pub const STREAK_SCAN_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Streak {
    /// Contiguous honored run ending exactly at the reference day.
    pub current: u32,
    /// Longest honored run anywhere in the scan window.
    pub best: u32,
}

/// Compute (current, best) walking backward from `end_day`.
///
/// `current` stops accumulating at the first non-honored day; the scan
/// keeps going so `best` still covers runs older than the break.
pub fn compute_streak(
    db: &Database,
    user_id: i64,
    end_day: NaiveDate,
    allowed_misses: u32,
) -> Result<Streak, DatabaseError> {
    let mut best = 0u32;
    let mut run = 0u32;
    let mut current = 0u32;
    let mut current_open = true;

    for i in 0..STREAK_SCAN_DAYS {
        let day = end_day - Duration::days(i64::from(i));
        let status = compute_day_status(db, user_id, day, allowed_misses)?;
        if status.honored {
            run += 1;
            best = best.max(run);
            if current_open {
                current += 1;
            }
        } else {
            run = 0;
            current_open = false;
        }
    }

    Ok(Streak { current, best })
}
