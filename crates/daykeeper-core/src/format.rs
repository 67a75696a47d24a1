//! Message formatters for prompts and summaries.
//!
//! Pure string builders; all times are rendered in the user's timezone.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::index::EventIndexEntry;
use crate::integrations::TaskItem;
use crate::storage::PersonRecord;
use crate::streak::Streak;

/// Numbered list of today's events, `N) HH:MM-HH:MM title`.
pub fn format_events(events: &[EventIndexEntry], tz: Tz) -> String {
    if events.is_empty() {
        return "No timed events found for today.".to_string();
    }

    let mut sorted: Vec<&EventIndexEntry> = events.iter().collect();
    sorted.sort_by_key(|e| e.ordinal);

    let lines: Vec<String> = sorted
        .iter()
        .map(|e| {
            let start = e.start_utc.with_timezone(&tz);
            let end = e.end_utc.with_timezone(&tz);
            format!(
                "{}) {}-{} {}",
                e.ordinal,
                start.format("%H:%M"),
                end.format("%H:%M"),
                e.title
            )
        })
        .collect();
    lines.join("\n")
}

/// People roster, priority-descending with computed day counts.
pub fn format_people(people: &[PersonRecord], today: NaiveDate) -> String {
    if people.is_empty() {
        return "No people saved.".to_string();
    }

    let mut sorted: Vec<&PersonRecord> = people.iter().collect();
    sorted.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let lines: Vec<String> = sorted
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let days_txt = match p.days_now(today) {
                Some(n) => format!(" — {n} days"),
                None => String::new(),
            };
            format!("{}) (P{}) {}{} — {}", i + 1, p.priority, p.name, days_txt, p.note)
        })
        .collect();
    lines.join("\n")
}

/// Numbered task list with due rendering and an overdue marker.
pub fn format_tasks_numbered(tasks: &[TaskItem], tz: Tz, now: DateTime<Utc>) -> String {
    if tasks.is_empty() {
        return "No active tasks.".to_string();
    }

    let now_local = now.with_timezone(&tz);
    let lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let mut due_txt = String::new();
            let mut overdue = false;

            if let Some(due) = &t.due {
                // Precision order: datetime > date > free-form string.
                if let Some(raw) = &due.datetime {
                    match DateTime::parse_from_rfc3339(raw) {
                        Ok(dt) => {
                            let local = dt.with_timezone(&tz);
                            due_txt = format!(" — due {}", local.format("%a %H:%M"));
                            overdue = local < now_local;
                        }
                        Err(_) => due_txt = format!(" — due {raw}"),
                    }
                } else if let Some(raw) = &due.date {
                    match raw.parse::<NaiveDate>() {
                        Ok(d) => {
                            due_txt = format!(" — due {}", d.format("%a %b %d"));
                            overdue = d < now_local.date_naive();
                        }
                        Err(_) => due_txt = format!(" — due {raw}"),
                    }
                } else if let Some(raw) = &due.string {
                    due_txt = format!(" — due {raw}");
                }
            }

            if overdue {
                due_txt.push_str(" (overdue)");
            }
            format!("{}) {}{}", i + 1, t.content, due_txt)
        })
        .collect();
    lines.join("\n")
}

/// One-line streak summary for the morning/winddown messages.
pub fn format_streak_line(s: &Streak) -> String {
    format!("Streak: current {}, best {}", s.current, s.best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::TaskDue;
    use chrono::TimeZone;

    fn tz() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn entry(ordinal: u32, title: &str, start_h: u32) -> EventIndexEntry {
        EventIndexEntry {
            id: ordinal as i64,
            user_id: 1,
            day: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            ordinal,
            occurrence_id: format!("cal:{ordinal}"),
            title: title.to_string(),
            start_utc: Utc.with_ymd_and_hms(2025, 6, 15, start_h, 0, 0).unwrap(),
            end_utc: Utc.with_ymd_and_hms(2025, 6, 15, start_h + 1, 0, 0).unwrap(),
            refreshed_at: Utc::now(),
        }
    }

    #[test]
    fn events_render_local_times_in_ordinal_order() {
        // 13:00 UTC = 09:00 EDT in June.
        let out = format_events(&[entry(2, "Lunch [cal]", 17), entry(1, "Standup [cal]", 13)], tz());
        assert_eq!(out, "1) 09:00-10:00 Standup [cal]\n2) 13:00-14:00 Lunch [cal]");
    }

    #[test]
    fn empty_events_message() {
        assert_eq!(format_events(&[], tz()), "No timed events found for today.");
    }

    #[test]
    fn people_sorted_by_priority_then_name() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let mk = |name: &str, prio: i64| PersonRecord {
            id: 0,
            user_id: 1,
            name: name.to_string(),
            priority: prio,
            note: "note".to_string(),
            start_day: Some(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()),
            base_days: Some(0),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let out = format_people(&[mk("bob", 5), mk("ann", 9)], today);
        assert_eq!(out, "1) (P9) ann — 5 days — note\n2) (P5) bob — 5 days — note");
    }

    #[test]
    fn tasks_render_due_and_overdue() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 16, 0, 0).unwrap();
        let tasks = vec![
            TaskItem {
                id: "1".into(),
                content: "buy milk".into(),
                due: Some(TaskDue {
                    datetime: Some("2025-06-15T10:00:00Z".into()),
                    date: None,
                    string: None,
                }),
                url: None,
            },
            TaskItem {
                id: "2".into(),
                content: "laundry".into(),
                due: Some(TaskDue {
                    datetime: None,
                    date: None,
                    string: Some("every Sunday".into()),
                }),
                url: None,
            },
            TaskItem {
                id: "3".into(),
                content: "untimed".into(),
                due: None,
                url: None,
            },
        ];
        let out = format_tasks_numbered(&tasks, tz(), now);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("1) buy milk — due Sun 06:00"));
        assert!(lines[0].ends_with("(overdue)"));
        assert_eq!(lines[1], "2) laundry — due every Sunday");
        assert_eq!(lines[2], "3) untimed");
    }
}
