//! Check-in ledger: the append-only record of every prompt fired and its
//! eventual acknowledgement.
//!
//! The fire-once contract lives here: a prompt key (user, day, kind, ref)
//! is inserted with a single atomic check-and-insert, so two overlapping
//! callers can never both decide to send. Records are never deleted and
//! are mutated exactly once, to attach the response.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;

use crate::error::DatabaseError;
use crate::storage::database::{day_str, parse_day, parse_utc};
use crate::storage::Database;

/// Daily fixed-prompt references.
pub const DAILY_MORNING: &str = "morning";
pub const DAILY_EVENTS_LIST: &str = "events_list";
pub const DAILY_RUN: &str = "run";
pub const DAILY_WINDDOWN: &str = "winddown";

/// What flavor of prompt a ledger record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckinKind {
    /// Fixed daily prompts: morning, events_list, run, winddown.
    Daily,
    /// Meal prompts; reference is the meal label.
    Meal,
    /// Per-calendar-event prompts; reference is the source occurrence id.
    Event,
}

impl CheckinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinKind::Daily => "daily",
            CheckinKind::Meal => "meal",
            CheckinKind::Event => "event",
        }
    }
}

impl fmt::Display for CheckinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckinKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(CheckinKind::Daily),
            "meal" => Ok(CheckinKind::Meal),
            "event" => Ok(CheckinKind::Event),
            other => Err(format!("unknown checkin kind: {other}")),
        }
    }
}

/// One ledger row: a prompt we sent and, once acknowledged, its response.
#[derive(Debug, Clone)]
pub struct CheckinRecord {
    pub id: i64,
    pub user_id: i64,
    pub day: NaiveDate,
    pub kind: CheckinKind,
    pub reference: String,
    pub prompted_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_text: Option<String>,
    pub attachment_ref: Option<String>,
}

impl CheckinRecord {
    pub fn is_pending(&self) -> bool {
        self.responded_at.is_none()
    }
}

impl Database {
    /// Atomic check-and-insert on the (user, day, kind, ref) key.
    ///
    /// Returns true when this call created the record; the caller then
    /// delivers the prompt. Returns false when the key already fired today.
    pub fn try_fire(
        &self,
        user_id: i64,
        day: NaiveDate,
        kind: CheckinKind,
        reference: &str,
        prompted_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO checkins (user_id, day, kind, ref, prompted_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                day_str(day),
                kind.as_str(),
                reference,
                prompted_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted == 1)
    }

    /// Attach a response to the most recently prompted unresponded record
    /// with this exact key. `Ok(None)` is the not-found signal the caller
    /// uses to fall back to a plain note.
    pub fn record_response(
        &self,
        user_id: i64,
        day: NaiveDate,
        kind: CheckinKind,
        reference: &str,
        responded_at: DateTime<Utc>,
        text: Option<&str>,
        attachment: Option<&str>,
    ) -> Result<Option<i64>, DatabaseError> {
        let id: Option<i64> = self
            .conn()
            .query_row(
                "SELECT id FROM checkins
                 WHERE user_id = ?1 AND day = ?2 AND kind = ?3 AND ref = ?4
                   AND responded_at IS NULL
                 ORDER BY prompted_at DESC, id DESC LIMIT 1",
                params![user_id, day_str(day), kind.as_str(), reference],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match id {
            Some(id) => {
                self.respond_by_id(id, responded_at, text, attachment)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// The most recent pending prompt across all kinds, used by the
    /// acknowledgement intake when a bare photo or text arrives. The
    /// events-list announcement never awaits a reply, so it is skipped;
    /// a reply sent after 07:15 lands on a prompt that actually counts.
    pub fn latest_pending(&self, user_id: i64) -> Result<Option<CheckinRecord>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, day, kind, ref, prompted_at, responded_at,
                    response_text, attachment_ref
             FROM checkins
             WHERE user_id = ?1 AND responded_at IS NULL AND ref != ?2
             ORDER BY prompted_at DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![user_id, DAILY_EVENTS_LIST], row_to_checkin)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn respond_by_id(
        &self,
        id: i64,
        responded_at: DateTime<Utc>,
        text: Option<&str>,
        attachment: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.conn().execute(
            "UPDATE checkins
             SET responded_at = ?2, response_text = ?3, attachment_ref = ?4
             WHERE id = ?1",
            params![id, responded_at.to_rfc3339(), text, attachment],
        )?;
        Ok(())
    }

    /// Every ledger row for (user, day), prompt order.
    pub fn checkins_for_day(
        &self,
        user_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<CheckinRecord>, DatabaseError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, day, kind, ref, prompted_at, responded_at,
                    response_text, attachment_ref
             FROM checkins WHERE user_id = ?1 AND day = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id, day_str(day)], row_to_checkin)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Responded `daily`-kind records for the day.
    ///
    /// The events-list announcement is informational and never counts
    /// toward the daily requirement.
    pub fn count_completed_daily(
        &self,
        user_id: i64,
        day: NaiveDate,
    ) -> Result<u32, DatabaseError> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM checkins
             WHERE user_id = ?1 AND day = ?2 AND kind = 'daily'
               AND ref != 'events_list'
               AND responded_at IS NOT NULL",
            params![user_id, day_str(day)],
            |row| row.get(0),
        )?;
        Ok(n as u32)
    }

    /// Responded `event`-kind records carrying a photo or text.
    pub fn count_completed_event_photos(
        &self,
        user_id: i64,
        day: NaiveDate,
    ) -> Result<u32, DatabaseError> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM checkins
             WHERE user_id = ?1 AND day = ?2 AND kind = 'event'
               AND responded_at IS NOT NULL
               AND (attachment_ref IS NOT NULL OR response_text IS NOT NULL)",
            params![user_id, day_str(day)],
            |row| row.get(0),
        )?;
        Ok(n as u32)
    }
}

fn row_to_checkin(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckinRecord> {
    let kind_str: String = row.get(3)?;
    let kind = kind_str.parse::<CheckinKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;
    let responded_at: Option<String> = row.get(6)?;
    Ok(CheckinRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        day: parse_day(2, &row.get::<_, String>(2)?)?,
        kind,
        reference: row.get(4)?,
        prompted_at: parse_utc(5, &row.get::<_, String>(5)?)?,
        responded_at: match responded_at {
            Some(s) => Some(parse_utc(6, &s)?),
            None => None,
        },
        response_text: row.get(7)?,
        attachment_ref: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn try_fire_is_once_per_key() {
        let db = Database::open_memory().unwrap();
        let u = db.get_or_create_user("1", "UTC", Utc::now()).unwrap();
        let now = Utc::now();

        assert!(db
            .try_fire(u.id, day(), CheckinKind::Daily, DAILY_MORNING, now)
            .unwrap());
        assert!(!db
            .try_fire(u.id, day(), CheckinKind::Daily, DAILY_MORNING, now)
            .unwrap());
        // Same reference under a different kind is a distinct key.
        assert!(db
            .try_fire(u.id, day(), CheckinKind::Meal, DAILY_MORNING, now)
            .unwrap());
        // Next day fires again.
        assert!(db
            .try_fire(
                u.id,
                day() + chrono::Duration::days(1),
                CheckinKind::Daily,
                DAILY_MORNING,
                now
            )
            .unwrap());
    }

    #[test]
    fn record_response_targets_key_and_signals_not_found() {
        let db = Database::open_memory().unwrap();
        let u = db.get_or_create_user("1", "UTC", Utc::now()).unwrap();
        let now = Utc::now();

        assert_eq!(
            db.record_response(u.id, day(), CheckinKind::Meal, "lunch", now, Some("soup"), None)
                .unwrap(),
            None
        );

        db.try_fire(u.id, day(), CheckinKind::Meal, "lunch", now)
            .unwrap();
        let id = db
            .record_response(u.id, day(), CheckinKind::Meal, "lunch", now, Some("soup"), None)
            .unwrap();
        assert!(id.is_some());

        // Already responded: not-found again.
        assert_eq!(
            db.record_response(u.id, day(), CheckinKind::Meal, "lunch", now, Some("more"), None)
                .unwrap(),
            None
        );

        let rows = db.checkins_for_day(u.id, day()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].response_text.as_deref(), Some("soup"));
        assert!(!rows[0].is_pending());
    }

    #[test]
    fn latest_pending_prefers_most_recent_prompt() {
        let db = Database::open_memory().unwrap();
        let u = db.get_or_create_user("1", "UTC", Utc::now()).unwrap();
        let early = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 6, 15, 14, 5, 0).unwrap();

        db.try_fire(u.id, day(), CheckinKind::Event, "cal:a", early)
            .unwrap();
        db.try_fire(u.id, day(), CheckinKind::Event, "cal:b", late)
            .unwrap();

        let pending = db.latest_pending(u.id).unwrap().unwrap();
        assert_eq!(pending.reference, "cal:b");

        db.respond_by_id(pending.id, late, None, Some("photo-1"))
            .unwrap();
        let pending = db.latest_pending(u.id).unwrap().unwrap();
        assert_eq!(pending.reference, "cal:a");
    }

    #[test]
    fn latest_pending_skips_the_events_list_announcement() {
        let db = Database::open_memory().unwrap();
        let u = db.get_or_create_user("1", "UTC", Utc::now()).unwrap();
        let seven = Utc.with_ymd_and_hms(2025, 6, 15, 7, 0, 0).unwrap();
        let quarter_past = seven + chrono::Duration::minutes(15);

        db.try_fire(u.id, day(), CheckinKind::Daily, DAILY_MORNING, seven)
            .unwrap();
        db.try_fire(u.id, day(), CheckinKind::Daily, DAILY_EVENTS_LIST, quarter_past)
            .unwrap();

        // A reply between 07:15 and the next prompt attaches to the
        // morning check-in, not the announcement.
        let pending = db.latest_pending(u.id).unwrap().unwrap();
        assert_eq!(pending.reference, DAILY_MORNING);
    }

    #[test]
    fn completion_counts_follow_response_shape() {
        let db = Database::open_memory().unwrap();
        let u = db.get_or_create_user("1", "UTC", Utc::now()).unwrap();
        let now = Utc::now();

        db.try_fire(u.id, day(), CheckinKind::Daily, DAILY_MORNING, now)
            .unwrap();
        db.try_fire(u.id, day(), CheckinKind::Daily, DAILY_RUN, now)
            .unwrap();
        db.try_fire(u.id, day(), CheckinKind::Event, "cal:a", now)
            .unwrap();
        db.try_fire(u.id, day(), CheckinKind::Event, "cal:b", now)
            .unwrap();

        db.record_response(u.id, day(), CheckinKind::Daily, DAILY_MORNING, now, Some("up"), None)
            .unwrap();
        db.record_response(u.id, day(), CheckinKind::Event, "cal:a", now, None, Some("photo"))
            .unwrap();

        assert_eq!(db.count_completed_daily(u.id, day()).unwrap(), 1);
        assert_eq!(db.count_completed_event_photos(u.id, day()).unwrap(), 1);
    }
}
