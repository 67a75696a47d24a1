//! Collaborator interfaces the engine consumes.
//!
//! The chat transport, the task tracker, and the calendar feed resolvers
//! are external capabilities; the engine only sees these traits. Concrete
//! implementations live in sibling modules, test doubles in the test trees.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{SourceError, TaskServiceError, TransportError};

/// One concrete instance of a (possibly recurring) calendar event
/// intersecting a given day. Transient: only used to build the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Stable per-occurrence identifier within the source.
    pub occurrence_id: String,
    pub title: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    /// All-day entries are excluded from the index by default.
    #[serde(default)]
    pub all_day: bool,
    /// Source label; stamped by the index builder.
    #[serde(default)]
    pub source: String,
}

/// A calendar feed, already expanded to concrete occurrences.
///
/// Recurring definitions are the resolver's problem: `resolve_occurrences`
/// must return every occurrence whose interval intersects the local-day
/// window of `day` in `tz`.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Source label, used for dedupe tie-breaks and index titles.
    fn label(&self) -> &str;

    async fn resolve_occurrences(
        &self,
        tz: Tz,
        day: NaiveDate,
    ) -> Result<Vec<Occurrence>, SourceError>;
}

/// Outbound message delivery to a chat handle.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, chat_handle: &str, text: &str) -> Result<(), TransportError>;
}

/// Due information on a remote task, in decreasing order of precision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDue {
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub string: Option<String>,
}

/// A task from the remote tracker, used to compose the morning summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub due: Option<TaskDue>,
    #[serde(default)]
    pub url: Option<String>,
}

/// The remote task tracker.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn list_active_tasks(&self) -> Result<Vec<TaskItem>, TaskServiceError>;

    async fn add_task(
        &self,
        content: &str,
        due: Option<&str>,
    ) -> Result<TaskItem, TaskServiceError>;

    async fn close_task(&self, task_id: &str) -> Result<(), TaskServiceError>;
}
