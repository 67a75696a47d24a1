//! Calendar feed sources.
//!
//! `JsonFeedSource` reads a file of pre-expanded occurrences (one JSON
//! array); `StaticSource` holds them in memory and backs the test suite.
//! Both return only occurrences intersecting the requested local day.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::clock::local_day_window;
use crate::error::SourceError;
use crate::integrations::traits::{CalendarSource, Occurrence};

/// Keep occurrences whose `[start, end)` intersects the day window.
fn intersecting(occurrences: Vec<Occurrence>, tz: Tz, day: NaiveDate) -> Vec<Occurrence> {
    let (win_start, win_end) = local_day_window(tz, day);
    occurrences
        .into_iter()
        .filter(|o| o.start_utc < win_end && o.end_utc > win_start)
        .collect()
}

/// In-memory source over a fixed occurrence list.
pub struct StaticSource {
    label: String,
    occurrences: Vec<Occurrence>,
}

impl StaticSource {
    pub fn new(label: &str, occurrences: Vec<Occurrence>) -> Self {
        Self {
            label: label.to_string(),
            occurrences,
        }
    }
}

#[async_trait]
impl CalendarSource for StaticSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn resolve_occurrences(
        &self,
        tz: Tz,
        day: NaiveDate,
    ) -> Result<Vec<Occurrence>, SourceError> {
        Ok(intersecting(self.occurrences.clone(), tz, day))
    }
}

/// Source backed by a JSON file containing an `Occurrence` array.
///
/// The file is re-read on every resolve so edits show up at the next
/// rebuild without a restart.
pub struct JsonFeedSource {
    label: String,
    path: PathBuf,
}

impl JsonFeedSource {
    pub fn new(label: &str, path: &Path) -> Self {
        Self {
            label: label.to_string(),
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl CalendarSource for JsonFeedSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn resolve_occurrences(
        &self,
        tz: Tz,
        day: NaiveDate,
    ) -> Result<Vec<Occurrence>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Unavailable {
                label: self.label.clone(),
                message: format!("{}: {e}", self.path.display()),
            })?;

        let occurrences: Vec<Occurrence> =
            serde_json::from_str(&raw).map_err(|e| SourceError::Malformed {
                label: self.label.clone(),
                message: e.to_string(),
            })?;

        Ok(intersecting(occurrences, tz, day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    fn tz() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn occ(id: &str, start: (u32, u32, u32, u32), hours: i64) -> Occurrence {
        let (m, d, h, min) = start;
        let start_utc = Utc.with_ymd_and_hms(2025, m, d, h, min, 0).unwrap();
        Occurrence {
            occurrence_id: id.to_string(),
            title: id.to_string(),
            start_utc,
            end_utc: start_utc + chrono::Duration::hours(hours),
            all_day: false,
            source: String::new(),
        }
    }

    #[tokio::test]
    async fn static_source_filters_to_day_window() {
        // June 15 in New York spans 04:00 UTC Jun 15 to 04:00 UTC Jun 16.
        let src = StaticSource::new(
            "cal",
            vec![
                occ("inside", (6, 15, 14, 0), 1),
                occ("before", (6, 15, 2, 0), 1),
                occ("straddles-midnight", (6, 16, 3, 30), 2),
            ],
        );
        let day = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let got = src.resolve_occurrences(tz(), day).await.unwrap();
        let ids: Vec<&str> = got.iter().map(|o| o.occurrence_id.as_str()).collect();
        assert_eq!(ids, vec!["inside", "straddles-midnight"]);
    }

    #[tokio::test]
    async fn json_feed_reads_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        let occurrences = vec![occ("a", (6, 15, 14, 0), 1), occ("b", (6, 20, 14, 0), 1)];
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{}", serde_json::to_string(&occurrences).unwrap()).unwrap();

        let src = JsonFeedSource::new("feed", &path);
        let day = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let got = src.resolve_occurrences(tz(), day).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].occurrence_id, "a");
    }

    #[tokio::test]
    async fn missing_file_is_unavailable_not_panic() {
        let src = JsonFeedSource::new("feed", Path::new("/nonexistent/feed.json"));
        let day = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let err = src.resolve_occurrences(tz(), day).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn malformed_json_is_reported_as_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, "{not json").unwrap();

        let src = JsonFeedSource::new("feed", &path);
        let day = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let err = src.resolve_occurrences(tz(), day).await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
