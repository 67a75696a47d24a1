//! External integrations: chat transport, task tracker, calendar feeds.

pub mod feed;
pub mod telegram;
pub mod todoist;
pub mod traits;

pub use feed::{JsonFeedSource, StaticSource};
pub use telegram::TelegramTransport;
pub use todoist::TodoistService;
pub use traits::{CalendarSource, MessageTransport, Occurrence, TaskDue, TaskItem, TaskService};
