//! TOML-based application configuration.
//!
//! Stores:
//! - Scheduler knobs (tick interval, allowed misses, event prompt offset)
//! - Meal check-in times (label -> "HH:MM")
//! - Calendar feed sources (label -> feed location)
//! - Telegram / Todoist credentials
//!
//! Configuration is stored at `~/.config/daykeeper/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::NaiveTime;

use super::data_dir;
use crate::clock::parse_hhmm;

/// Scheduler knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Tick interval in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Misses a day may absorb and still count as honored.
    #[serde(default = "default_allowed_misses")]
    pub allowed_misses_per_day: u32,
    /// Minutes after an event's start at which its check-in fires.
    #[serde(default = "default_event_offset_min")]
    pub event_offset_min: i64,
    /// Per-call bound on external I/O (calendar, chat, tasks), seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Accelerated manual-verification mode: four fires 1-4 minutes after
    /// a user's first observed tick, replacing the production triggers.
    #[serde(default)]
    pub test_mode: bool,
}

/// Calendar feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CalendarConfig {
    /// Source label -> feed location (path to an expanded-occurrence file).
    #[serde(default)]
    pub sources: HashMap<String, String>,
    /// Include all-day entries in the index.
    #[serde(default)]
    pub include_all_day: bool,
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

/// Todoist task-service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TodoistConfig {
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/daykeeper/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Timezone assigned to users on first contact.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Meal label -> "HH:MM" local time.
    #[serde(default = "default_meals")]
    pub meals: HashMap<String, String>,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub todoist: TodoistConfig,
}

fn default_tick_secs() -> u64 {
    60
}
fn default_allowed_misses() -> u32 {
    1
}
fn default_event_offset_min() -> i64 {
    5
}
fn default_call_timeout_secs() -> u64 {
    25
}
fn default_timezone() -> String {
    "America/New_York".into()
}

fn default_meals() -> HashMap<String, String> {
    HashMap::from([
        ("breakfast".to_string(), "08:30".to_string()),
        ("fruit".to_string(), "12:00".to_string()),
        ("lunch".to_string(), "14:00".to_string()),
        ("dinner".to_string(), "19:00".to_string()),
    ])
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            allowed_misses_per_day: default_allowed_misses(),
            event_offset_min: default_event_offset_min(),
            call_timeout_secs: default_call_timeout_secs(),
            test_mode: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            scheduler: SchedulerSettings::default(),
            meals: default_meals(),
            calendar: CalendarConfig::default(),
            telegram: TelegramConfig::default(),
            todoist: TodoistConfig::default(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(Self::path()?, content)?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Validated meal schedule.
    ///
    /// Malformed entries are handled per-entry: a bad time for a known
    /// default label falls back to the default time, anything else is
    /// dropped with a warning. The whole configuration never aborts over
    /// one bad line.
    pub fn meal_times(&self) -> BTreeMap<String, NaiveTime> {
        let defaults = default_meals();
        let mut out = BTreeMap::new();
        for (label, raw) in &self.meals {
            match parse_hhmm(raw) {
                Some(t) => {
                    out.insert(label.clone(), t);
                }
                None => match defaults.get(label).and_then(|d| parse_hhmm(d)) {
                    Some(t) => {
                        log::warn!(
                            "meal '{label}' has malformed time '{raw}', using default {t}"
                        );
                        out.insert(label.clone(), t);
                    }
                    None => {
                        log::warn!("dropping meal '{label}' with malformed time '{raw}'");
                    }
                },
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.scheduler.tick_secs, 60);
        assert_eq!(parsed.scheduler.allowed_misses_per_day, 1);
        assert_eq!(parsed.scheduler.event_offset_min, 5);
        assert_eq!(parsed.default_timezone, "America/New_York");
    }

    #[test]
    fn default_meal_times_parse() {
        let cfg = Config::default();
        let meals = cfg.meal_times();
        assert_eq!(meals.len(), 4);
        assert_eq!(
            meals.get("breakfast"),
            Some(&NaiveTime::from_hms_opt(8, 30, 0).unwrap())
        );
        assert_eq!(
            meals.get("dinner"),
            Some(&NaiveTime::from_hms_opt(19, 0, 0).unwrap())
        );
    }

    #[test]
    fn malformed_known_meal_falls_back_to_default() {
        let mut cfg = Config::default();
        cfg.meals
            .insert("lunch".to_string(), "not-a-time".to_string());
        let meals = cfg.meal_times();
        assert_eq!(
            meals.get("lunch"),
            Some(&NaiveTime::from_hms_opt(14, 0, 0).unwrap())
        );
    }

    #[test]
    fn malformed_custom_meal_is_dropped() {
        let mut cfg = Config::default();
        cfg.meals
            .insert("second_breakfast".to_string(), "11h00".to_string());
        let meals = cfg.meal_times();
        assert!(!meals.contains_key("second_breakfast"));
        // the valid defaults survive
        assert_eq!(meals.len(), 4);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            default_timezone = "Europe/Berlin"

            [scheduler]
            allowed_misses_per_day = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.default_timezone, "Europe/Berlin");
        assert_eq!(cfg.scheduler.allowed_misses_per_day, 2);
        assert_eq!(cfg.scheduler.tick_secs, 60);
        assert_eq!(cfg.meals.len(), 4);
    }
}
