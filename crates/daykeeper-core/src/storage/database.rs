//! SQLite-backed persistent store.
//!
//! Holds the four logical partitions the engine reads and writes:
//! - `users` (one row per chat handle)
//! - `event_index` (numbered per-user-per-day calendar index)
//! - `checkins` (the append-only check-in ledger)
//! - `notes` and `people` (plain-note fallback and morning-summary roster)
//!
//! All mutations are scoped to a single (user, day) partition or a single
//! ledger key, so per-key SQLite atomicity is the only locking needed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use crate::error::DatabaseError;

/// A registered user. Exactly one row per chat handle.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub chat_handle: String,
    pub timezone: String,
    /// Set by the refresh command, cleared by the scheduler after it
    /// rebuilds the event index.
    pub needs_reindex: bool,
    pub created_at: DateTime<Utc>,
}

/// A tracked person shown in the morning summary.
#[derive(Debug, Clone)]
pub struct PersonRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// 1..10, higher sorts first.
    pub priority: i64,
    pub note: String,
    pub start_day: Option<NaiveDate>,
    pub base_days: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonRecord {
    /// Days tracked as of `today`: user-entered base plus elapsed days.
    pub fn days_now(&self, today: NaiveDate) -> Option<i64> {
        match (self.base_days, self.start_day) {
            (Some(base), Some(start)) => Some(base + (today - start).num_days()),
            _ => None,
        }
    }
}

/// SQLite database holding users, the event index, and the check-in ledger.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Open the database at `~/.config/daykeeper/daykeeper.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let path = data_dir()?.join("daykeeper.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (and migrate) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|e| DatabaseError::OpenFailed {
            path: PathBuf::from(path),
            source: e,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|e| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    chat_handle   TEXT NOT NULL UNIQUE,
                    timezone      TEXT NOT NULL,
                    needs_reindex INTEGER NOT NULL DEFAULT 0,
                    created_at    TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS event_index (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id       INTEGER NOT NULL REFERENCES users(id),
                    day           TEXT NOT NULL,
                    ordinal       INTEGER NOT NULL,
                    occurrence_id TEXT NOT NULL,
                    title         TEXT NOT NULL,
                    start_utc     TEXT NOT NULL,
                    end_utc       TEXT NOT NULL,
                    refreshed_at  TEXT NOT NULL,
                    UNIQUE (user_id, day, ordinal),
                    UNIQUE (user_id, day, occurrence_id)
                );

                CREATE TABLE IF NOT EXISTS checkins (
                    id             INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id        INTEGER NOT NULL REFERENCES users(id),
                    day            TEXT NOT NULL,
                    kind           TEXT NOT NULL,
                    ref            TEXT NOT NULL,
                    prompted_at    TEXT NOT NULL,
                    responded_at   TEXT,
                    response_text  TEXT,
                    attachment_ref TEXT,
                    UNIQUE (user_id, day, kind, ref)
                );

                CREATE TABLE IF NOT EXISTS notes (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id    INTEGER NOT NULL REFERENCES users(id),
                    day        TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    text       TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS people (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id    INTEGER NOT NULL REFERENCES users(id),
                    name       TEXT NOT NULL,
                    priority   INTEGER NOT NULL,
                    note       TEXT NOT NULL,
                    start_day  TEXT,
                    base_days  INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, name)
                );

                CREATE INDEX IF NOT EXISTS idx_event_index_user_day
                    ON event_index(user_id, day);
                CREATE INDEX IF NOT EXISTS idx_checkins_user_day
                    ON checkins(user_id, day);
                CREATE INDEX IF NOT EXISTS idx_checkins_pending
                    ON checkins(user_id, responded_at);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    // --- users ---

    /// Look up a user by chat handle.
    pub fn get_user(&self, chat_handle: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, chat_handle, timezone, needs_reindex, created_at
             FROM users WHERE chat_handle = ?1",
        )?;
        let user = stmt
            .query_row(params![chat_handle], row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Fetch or create the user for a chat handle. Created on first contact
    /// with the configured default timezone.
    pub fn get_or_create_user(
        &self,
        chat_handle: &str,
        default_timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, DatabaseError> {
        if let Some(user) = self.get_user(chat_handle)? {
            return Ok(user);
        }
        self.conn.execute(
            "INSERT INTO users (chat_handle, timezone, needs_reindex, created_at)
             VALUES (?1, ?2, 0, ?3)",
            params![chat_handle, default_timezone, now.to_rfc3339()],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(UserRecord {
            id,
            chat_handle: chat_handle.to_string(),
            timezone: default_timezone.to_string(),
            needs_reindex: false,
            created_at: now,
        })
    }

    /// All users, in creation order. The scheduler iterates this every tick.
    pub fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, chat_handle, timezone, needs_reindex, created_at
             FROM users ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    pub fn set_timezone(&self, user_id: i64, timezone: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE users SET timezone = ?2 WHERE id = ?1",
            params![user_id, timezone],
        )?;
        Ok(())
    }

    pub fn set_needs_reindex(&self, user_id: i64, value: bool) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE users SET needs_reindex = ?2 WHERE id = ?1",
            params![user_id, value as i64],
        )?;
        Ok(())
    }

    // --- notes ---

    /// Save a plain daily note (anything not matching a pending check-in).
    pub fn add_note(
        &self,
        user_id: i64,
        day: NaiveDate,
        now: DateTime<Utc>,
        text: &str,
    ) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO notes (user_id, day, created_at, text) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, day_str(day), now.to_rfc3339(), text],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn notes_for_day(
        &self,
        user_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT text FROM notes WHERE user_id = ?1 AND day = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id, day_str(day)], |row| row.get(0))?;
        let mut notes = Vec::new();
        for row in rows {
            notes.push(row?);
        }
        Ok(notes)
    }

    // --- people ---

    /// Insert or update a tracked person, keyed on (user, name).
    pub fn upsert_person(
        &self,
        user_id: i64,
        name: &str,
        priority: i64,
        note: &str,
        start_day: Option<NaiveDate>,
        base_days: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO people (user_id, name, priority, note, start_day, base_days, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (user_id, name) DO UPDATE SET
                priority = excluded.priority,
                note = excluded.note,
                start_day = excluded.start_day,
                base_days = excluded.base_days,
                updated_at = excluded.updated_at",
            params![
                user_id,
                name,
                priority,
                note,
                start_day.map(day_str),
                base_days,
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_people(&self, user_id: i64) -> Result<Vec<PersonRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, priority, note, start_day, base_days, created_at, updated_at
             FROM people WHERE user_id = ?1",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let start_day: Option<String> = row.get(5)?;
            Ok(PersonRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                priority: row.get(3)?,
                note: row.get(4)?,
                start_day: match start_day {
                    Some(s) => Some(parse_day(5, &s)?),
                    None => None,
                },
                base_days: row.get(6)?,
                created_at: parse_utc(7, &row.get::<_, String>(7)?)?,
                updated_at: parse_utc(8, &row.get::<_, String>(8)?)?,
            })
        })?;
        let mut people = Vec::new();
        for row in rows {
            people.push(row?);
        }
        Ok(people)
    }

    pub fn delete_person(&self, user_id: i64, name: &str) -> Result<bool, DatabaseError> {
        let n = self.conn.execute(
            "DELETE FROM people WHERE user_id = ?1 AND name = ?2 COLLATE NOCASE",
            params![user_id, name],
        )?;
        Ok(n > 0)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        chat_handle: row.get(1)?,
        timezone: row.get(2)?,
        needs_reindex: row.get::<_, i64>(3)? != 0,
        created_at: parse_utc(4, &row.get::<_, String>(4)?)?,
    })
}

/// Canonical storage form of a local day.
pub(crate) fn day_str(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_day(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_utc(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_is_created_once_per_handle() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let a = db.get_or_create_user("123", "America/New_York", now).unwrap();
        let b = db.get_or_create_user("123", "Europe/Berlin", now).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.timezone, "America/New_York");
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn reindex_flag_roundtrip() {
        let db = Database::open_memory().unwrap();
        let u = db.get_or_create_user("5", "UTC", Utc::now()).unwrap();
        assert!(!u.needs_reindex);
        db.set_needs_reindex(u.id, true).unwrap();
        assert!(db.get_user("5").unwrap().unwrap().needs_reindex);
        db.set_needs_reindex(u.id, false).unwrap();
        assert!(!db.get_user("5").unwrap().unwrap().needs_reindex);
    }

    #[test]
    fn person_days_now_counts_elapsed() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 1, 11).unwrap();
        let p = PersonRecord {
            id: 1,
            user_id: 1,
            name: "ann".into(),
            priority: 5,
            note: "".into(),
            start_day: Some(start),
            base_days: Some(2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(p.days_now(today), Some(12));
    }

    #[test]
    fn person_upsert_replaces_by_name() {
        let db = Database::open_memory().unwrap();
        let u = db.get_or_create_user("7", "UTC", Utc::now()).unwrap();
        db.upsert_person(u.id, "ann", 5, "first", None, None, Utc::now())
            .unwrap();
        db.upsert_person(u.id, "ann", 8, "second", None, Some(3), Utc::now())
            .unwrap();
        let people = db.list_people(u.id).unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].priority, 8);
        assert_eq!(people[0].note, "second");
    }

    #[test]
    fn open_at_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.get_or_create_user("1", "UTC", Utc::now()).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert!(db.get_user("1").unwrap().is_some());
    }
}
