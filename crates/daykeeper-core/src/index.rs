//! Daily event index builder.
//!
//! Resolves all configured calendar sources for one (user, local day),
//! merges and dedupes the occurrences, and materializes a numbered index
//! whose ordinals 1..N are the user-facing reference numbers. The whole
//! (user, day) partition is replaced in one transaction, so a reader never
//! observes a half-built index.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rusqlite::params;
use std::time::Duration;

use crate::clock::local_day_window;
use crate::error::{CoreError, DatabaseError, SourceError};
use crate::integrations::{CalendarSource, Occurrence};
use crate::storage::database::{day_str, parse_day, parse_utc};
use crate::storage::{Database, UserRecord};

/// One numbered row of a user's daily index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIndexEntry {
    pub id: i64,
    pub user_id: i64,
    pub day: NaiveDate,
    /// 1..N, assigned by ascending start time.
    pub ordinal: u32,
    pub occurrence_id: String,
    pub title: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub refreshed_at: DateTime<Utc>,
}

/// A source that failed during a rebuild. Partial results are kept.
#[derive(Debug, Clone)]
pub struct SourceWarning {
    pub source: String,
    pub message: String,
}

/// Result of a rebuild: how many entries landed, plus per-source warnings.
#[derive(Debug, Default)]
pub struct RebuildOutcome {
    pub entries: usize,
    pub warnings: Vec<SourceWarning>,
}

impl Database {
    /// Replace the whole (user, day) index partition with `occurrences`,
    /// already deduped and ordered; ordinals are assigned 1..N here.
    /// Delete-then-insert inside a single transaction.
    pub fn replace_day_index(
        &mut self,
        user_id: i64,
        day: NaiveDate,
        occurrences: &[Occurrence],
        now: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "DELETE FROM event_index WHERE user_id = ?1 AND day = ?2",
            params![user_id, day_str(day)],
        )?;
        for (i, occ) in occurrences.iter().enumerate() {
            tx.execute(
                "INSERT INTO event_index
                    (user_id, day, ordinal, occurrence_id, title, start_utc, end_utc, refreshed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user_id,
                    day_str(day),
                    (i + 1) as i64,
                    occ.occurrence_id,
                    format!("{} [{}]", occ.title, occ.source),
                    occ.start_utc.to_rfc3339(),
                    occ.end_utc.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(occurrences.len())
    }

    /// The index partition for (user, day), ordered by ordinal.
    pub fn events_for_day(
        &self,
        user_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<EventIndexEntry>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, day, ordinal, occurrence_id, title, start_utc, end_utc, refreshed_at
             FROM event_index WHERE user_id = ?1 AND day = ?2 ORDER BY ordinal",
        )?;
        let rows = stmt.query_map(params![user_id, day_str(day)], |row| {
            Ok(EventIndexEntry {
                id: row.get(0)?,
                user_id: row.get(1)?,
                day: parse_day(2, &row.get::<_, String>(2)?)?,
                ordinal: row.get::<_, i64>(3)? as u32,
                occurrence_id: row.get(4)?,
                title: row.get(5)?,
                start_utc: parse_utc(6, &row.get::<_, String>(6)?)?,
                end_utc: parse_utc(7, &row.get::<_, String>(7)?)?,
                refreshed_at: parse_utc(8, &row.get::<_, String>(8)?)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Row count of the (user, day) partition.
    pub fn required_event_count(
        &self,
        user_id: i64,
        day: NaiveDate,
    ) -> Result<u32, DatabaseError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM event_index WHERE user_id = ?1 AND day = ?2",
            params![user_id, day_str(day)],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}

/// Order by (start, source, title), then dedupe by (start, end, title).
///
/// Sorting before deduping pins which copy survives when the same
/// underlying event arrives from two redundantly-subscribed feeds: the
/// one from the lexicographically-first source label. Ordinal
/// assignment is therefore deterministic across rebuilds regardless of
/// the order sources were polled in.
pub fn dedupe_and_order(mut occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
    occurrences.sort_by(|a, b| {
        a.start_utc
            .cmp(&b.start_utc)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.title.cmp(&b.title))
    });
    let mut seen = std::collections::HashSet::new();
    occurrences
        .into_iter()
        .filter(|occ| seen.insert((occ.start_utc, occ.end_utc, occ.title.clone())))
        .collect()
}

/// Rebuild the (user, day) index from every configured source.
///
/// A source that errors or times out contributes nothing and is reported
/// as a warning; the rebuild itself never fails because one feed is down.
/// Occurrences outside the local-day window and (by default) all-day
/// entries are dropped before numbering.
pub async fn rebuild_index(
    db: &mut Database,
    sources: &[Box<dyn CalendarSource>],
    user: &UserRecord,
    tz: Tz,
    day: NaiveDate,
    include_all_day: bool,
    call_timeout: Duration,
    now: DateTime<Utc>,
) -> Result<RebuildOutcome, CoreError> {
    let (window_start, window_end) = local_day_window(tz, day);

    let mut merged: Vec<Occurrence> = Vec::new();
    let mut warnings = Vec::new();

    for source in sources {
        let label = source.label().to_string();
        let resolved = tokio::time::timeout(call_timeout, source.resolve_occurrences(tz, day))
            .await
            .map_err(|_| SourceError::Timeout {
                label: label.clone(),
                timeout_secs: call_timeout.as_secs(),
            })
            .and_then(|r| r);

        match resolved {
            Ok(occurrences) => {
                for mut occ in occurrences {
                    if occ.all_day && !include_all_day {
                        continue;
                    }
                    if occ.end_utc <= window_start || occ.start_utc >= window_end {
                        continue;
                    }
                    occ.source = label.clone();
                    merged.push(occ);
                }
            }
            Err(e) => {
                log::warn!("calendar source '{label}' failed for user {}: {e}", user.id);
                warnings.push(SourceWarning {
                    source: label,
                    message: e.to_string(),
                });
            }
        }
    }

    let ordered = dedupe_and_order(merged);
    let entries = db.replace_day_index(user.id, day, &ordered, now)?;

    Ok(RebuildOutcome { entries, warnings })
}
