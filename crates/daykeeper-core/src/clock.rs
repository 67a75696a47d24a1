//! Wall-clock and timezone adapter.
//!
//! Every user carries an IANA timezone name; the scheduler evaluates all
//! triggers in that zone. The `Clock` trait is constructor-injected so the
//! tick loop can be driven deterministically in tests.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Source of "now". Production code uses [`SystemClock`].
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually-driven clock for tests.
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, d: chrono::Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard += d;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Resolve a stored IANA timezone name.
///
/// # Errors
/// Returns [`ConfigError::UnknownTimezone`] for names chrono-tz does not know.
pub fn resolve_tz(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::UnknownTimezone(name.to_string()))
}

pub fn now_in_tz(clock: &dyn Clock, tz: Tz) -> DateTime<Tz> {
    clock.now_utc().with_timezone(&tz)
}

pub fn today_in_tz(clock: &dyn Clock, tz: Tz) -> NaiveDate {
    now_in_tz(clock, tz).date_naive()
}

pub fn is_after_local_hour(clock: &dyn Clock, tz: Tz, hour_24: u32) -> bool {
    now_in_tz(clock, tz).hour() >= hour_24
}

/// Minute-precision equality of two instants.
///
/// Triggers fire when "now" and the target fall inside the same calendar
/// minute; paired with the ledger's fire-once key this yields at most one
/// fire per label per day even if the tick cadence drifts.
pub fn same_minute<T1: TimeZone, T2: TimeZone>(a: &DateTime<T1>, b: &DateTime<T2>) -> bool {
    a.timestamp().div_euclid(60) == b.timestamp().div_euclid(60)
}

/// Local-day window `[local midnight, local midnight + 24h)` as UTC instants.
///
/// On DST transitions where local midnight does not exist, the earliest
/// valid instant is used.
pub fn local_day_window(tz: Tz, day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_instant(tz, day, NaiveTime::MIN);
    let end = local_instant(tz, day + chrono::Duration::days(1), NaiveTime::MIN);
    (start, end)
}

/// Concrete UTC instant for a local wall time on a given local day.
/// Ambiguous local times resolve to the earliest instant; nonexistent
/// local times (DST spring-forward) shift forward by one hour.
pub fn local_instant(tz: Tz, day: NaiveDate, at: NaiveTime) -> DateTime<Utc> {
    let naive = day.and_time(at);
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        chrono::LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                // Fall back to interpreting the wall time as UTC; only
                // reachable for pathological zone data.
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
        }
    }
}

/// Parse a `HH:MM` string, the format used by meal and trigger times.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}
