//! Trigger timing: next-fire-instant computation for the tick loop.
//!
//! Every trigger resolves to a concrete UTC instant for the day under
//! evaluation; the loop fires it when "now" falls in the same calendar
//! minute. The ledger's fire-once key makes the comparison safe to
//! re-evaluate on every tick.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::clock::{local_instant, same_minute};
use crate::ledger::{DAILY_EVENTS_LIST, DAILY_MORNING, DAILY_RUN, DAILY_WINDDOWN};

/// The four fixed daily prompts and their local wall times.
pub fn fixed_triggers() -> [(&'static str, NaiveTime); 4] {
    [
        (DAILY_MORNING, NaiveTime::from_hms_opt(7, 0, 0).unwrap()),
        (DAILY_EVENTS_LIST, NaiveTime::from_hms_opt(7, 15, 0).unwrap()),
        (DAILY_RUN, NaiveTime::from_hms_opt(7, 30, 0).unwrap()),
        (DAILY_WINDDOWN, NaiveTime::from_hms_opt(21, 0, 0).unwrap()),
    ]
}

/// UTC fire instant of a local wall-time trigger on `day`.
pub fn fire_instant(tz: Tz, day: NaiveDate, at: NaiveTime) -> DateTime<Utc> {
    local_instant(tz, day, at)
}

/// True when `now` falls in the trigger's calendar minute.
pub fn is_due(now: DateTime<Utc>, fire_at: DateTime<Utc>) -> bool {
    same_minute(&now, &fire_at)
}

/// Accelerated-verification trigger state, one instance per user.
///
/// Owned by the scheduler instance, never persisted: a restart resets
/// the four timers relative to the first tick that sees the user.
pub struct TestTriggers {
    fires: [(&'static str, DateTime<Utc>); 4],
    fired: HashSet<&'static str>,
}

impl TestTriggers {
    /// Schedule the four labels 1..4 minutes after `first_tick`.
    pub fn new(first_tick: DateTime<Utc>) -> Self {
        Self {
            fires: [
                ("07:00", first_tick + Duration::minutes(1)),
                ("07:15", first_tick + Duration::minutes(2)),
                ("07:30", first_tick + Duration::minutes(3)),
                ("21:00", first_tick + Duration::minutes(4)),
            ],
            fired: HashSet::new(),
        }
    }

    /// Labels whose minute has arrived and which have not fired yet.
    /// Marks them fired.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<&'static str> {
        let mut due = Vec::new();
        for (label, at) in self.fires {
            if !self.fired.contains(label) && same_minute(&now, &at) {
                self.fired.insert(label);
                due.push(label);
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_trigger_instants_follow_the_zone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let morning = fire_instant(tz, day, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        // 07:00 EDT is 11:00 UTC.
        assert_eq!(morning, Utc.with_ymd_and_hms(2025, 6, 15, 11, 0, 0).unwrap());
    }

    #[test]
    fn due_only_within_the_minute() {
        let fire = Utc.with_ymd_and_hms(2025, 6, 15, 11, 0, 0).unwrap();
        assert!(is_due(fire + Duration::seconds(59), fire));
        assert!(!is_due(fire + Duration::seconds(60), fire));
        assert!(!is_due(fire - Duration::seconds(1), fire));
    }

    #[test]
    fn test_triggers_fire_each_label_once() {
        let start = Utc.with_ymd_and_hms(2025, 6, 15, 11, 0, 0).unwrap();
        let mut t = TestTriggers::new(start);

        assert!(t.take_due(start).is_empty());
        assert_eq!(t.take_due(start + Duration::minutes(1)), vec!["07:00"]);
        // Same minute again: already fired.
        assert!(t
            .take_due(start + Duration::minutes(1) + Duration::seconds(30))
            .is_empty());
        assert_eq!(t.take_due(start + Duration::minutes(4)), vec!["21:00"]);
    }
}
