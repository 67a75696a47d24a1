//! Response intake and read-side queries.
//!
//! Inbound photos and texts either acknowledge the most recent pending
//! prompt or, when nothing is pending, land in the notes log. The read
//! side serves the status/streak/events commands, rebuilding the index
//! on demand when a day's partition is empty.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::time::Duration;

use crate::error::{CoreError, DatabaseError};
use crate::index::{rebuild_index, EventIndexEntry, RebuildOutcome};
use crate::integrations::CalendarSource;
use crate::ledger::CheckinKind;
use crate::status::{compute_day_status, DayStatus};
use crate::storage::{Database, UserRecord};
use crate::streak::{compute_streak, Streak};

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Matched a pending prompt and closed it.
    Acknowledged {
        kind: CheckinKind,
        reference: String,
    },
    /// Nothing pending; stored in the notes log for the day.
    SavedAsNote,
}

/// Attach a photo to the most recent pending prompt, or save a note.
pub fn on_photo(
    db: &Database,
    user_id: i64,
    day: NaiveDate,
    now: DateTime<Utc>,
    attachment_ref: &str,
    caption: Option<&str>,
) -> Result<IntakeOutcome, DatabaseError> {
    match db.latest_pending(user_id)? {
        Some(pending) => {
            db.respond_by_id(pending.id, now, caption, Some(attachment_ref))?;
            Ok(IntakeOutcome::Acknowledged {
                kind: pending.kind,
                reference: pending.reference,
            })
        }
        None => {
            let text = match caption {
                Some(c) if !c.trim().is_empty() => format!("[photo {attachment_ref}] {c}"),
                _ => format!("[photo {attachment_ref}]"),
            };
            db.add_note(user_id, day, now, &text)?;
            Ok(IntakeOutcome::SavedAsNote)
        }
    }
}

/// Attach a text reply to the most recent pending prompt, or save a note.
pub fn on_text(
    db: &Database,
    user_id: i64,
    day: NaiveDate,
    now: DateTime<Utc>,
    text: &str,
) -> Result<IntakeOutcome, DatabaseError> {
    match db.latest_pending(user_id)? {
        Some(pending) => {
            db.respond_by_id(pending.id, now, Some(text), None)?;
            Ok(IntakeOutcome::Acknowledged {
                kind: pending.kind,
                reference: pending.reference,
            })
        }
        None => {
            db.add_note(user_id, day, now, text)?;
            Ok(IntakeOutcome::SavedAsNote)
        }
    }
}

pub fn get_day_status(
    db: &Database,
    user_id: i64,
    day: NaiveDate,
    allowed_misses: u32,
) -> Result<DayStatus, DatabaseError> {
    compute_day_status(db, user_id, day, allowed_misses)
}

pub fn get_streak(
    db: &Database,
    user_id: i64,
    end_day: NaiveDate,
    allowed_misses: u32,
) -> Result<Streak, DatabaseError> {
    compute_streak(db, user_id, end_day, allowed_misses)
}

/// Today's index, rebuilding it first when the partition is empty.
///
/// An empty partition cannot be told apart from a never-built one, so
/// reads go through the builder; a genuinely free day just rebuilds to
/// zero rows again.
#[allow(clippy::too_many_arguments)]
pub async fn get_today_events(
    db: &mut Database,
    sources: &[Box<dyn CalendarSource>],
    user: &UserRecord,
    tz: Tz,
    day: NaiveDate,
    include_all_day: bool,
    call_timeout: Duration,
    now: DateTime<Utc>,
) -> Result<(Vec<EventIndexEntry>, RebuildOutcome), CoreError> {
    let existing = db.events_for_day(user.id, day)?;
    if !existing.is_empty() && !user.needs_reindex {
        return Ok((existing, RebuildOutcome::default()));
    }

    let outcome = rebuild_index(db, sources, user, tz, day, include_all_day, call_timeout, now)
        .await?;
    if user.needs_reindex {
        db.set_needs_reindex(user.id, false)?;
    }
    let entries = db.events_for_day(user.id, day)?;
    Ok((entries, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DAILY_MORNING;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn photo_closes_latest_pending_prompt() {
        let db = Database::open_memory().unwrap();
        let user = db.get_or_create_user("u", "UTC", now()).unwrap();
        db.try_fire(user.id, day(), CheckinKind::Daily, DAILY_MORNING, now())
            .unwrap();
        db.try_fire(user.id, day(), CheckinKind::Meal, "lunch", now() + chrono::Duration::minutes(5))
            .unwrap();

        let outcome = on_photo(&db, user.id, day(), now(), "file-123", Some("pasta")).unwrap();
        assert_eq!(
            outcome,
            IntakeOutcome::Acknowledged {
                kind: CheckinKind::Meal,
                reference: "lunch".to_string()
            }
        );

        // The older prompt is still pending.
        let still_pending = db.latest_pending(user.id).unwrap().unwrap();
        assert_eq!(still_pending.reference, DAILY_MORNING);
    }

    #[test]
    fn text_without_pending_prompt_becomes_note() {
        let db = Database::open_memory().unwrap();
        let user = db.get_or_create_user("u", "UTC", now()).unwrap();

        let outcome = on_text(&db, user.id, day(), now(), "remember the milk").unwrap();
        assert_eq!(outcome, IntakeOutcome::SavedAsNote);
        assert_eq!(
            db.notes_for_day(user.id, day()).unwrap(),
            vec!["remember the milk".to_string()]
        );
    }

    #[test]
    fn photo_without_pending_prompt_is_noted_with_marker() {
        let db = Database::open_memory().unwrap();
        let user = db.get_or_create_user("u", "UTC", now()).unwrap();

        let outcome = on_photo(&db, user.id, day(), now(), "file-9", None).unwrap();
        assert_eq!(outcome, IntakeOutcome::SavedAsNote);
        let notes = db.notes_for_day(user.id, day()).unwrap();
        assert_eq!(notes, vec!["[photo file-9]".to_string()]);
    }

    #[tokio::test]
    async fn read_through_rebuild_populates_empty_partition() {
        use crate::integrations::{Occurrence, StaticSource};

        let mut db = Database::open_memory().unwrap();
        let user = db.get_or_create_user("u", "UTC", now()).unwrap();
        let tz: Tz = "UTC".parse().unwrap();

        let start = Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap();
        let sources: Vec<Box<dyn CalendarSource>> = vec![Box::new(StaticSource::new(
            "cal",
            vec![Occurrence {
                occurrence_id: "e1".into(),
                title: "Standup".into(),
                start_utc: start,
                end_utc: start + chrono::Duration::hours(1),
                all_day: false,
                source: String::new(),
            }],
        ))];

        let (entries, outcome) = get_today_events(
            &mut db,
            &sources,
            &user,
            tz,
            day(),
            false,
            Duration::from_secs(5),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(outcome.entries, 1);
        assert_eq!(entries[0].title, "Standup [cal]");

        // Second read serves the stored partition without a rebuild.
        let (again, outcome) = get_today_events(
            &mut db,
            &sources,
            &user,
            tz,
            day(),
            false,
            Duration::from_secs(5),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(outcome.entries, 0);
    }
}
