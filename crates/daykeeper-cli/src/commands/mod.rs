pub mod config;
pub mod events;
pub mod note;
pub mod people;
pub mod reply;
pub mod run;
pub mod status;
pub mod streak;
pub mod todo;
pub mod tz;

use std::path::Path;

use chrono::Utc;
use chrono_tz::Tz;

use daykeeper_core::clock::resolve_tz;
use daykeeper_core::integrations::{JsonFeedSource, TelegramTransport, TodoistService};
use daykeeper_core::{CalendarSource, Config, Database, MessageTransport, TaskService, UserRecord};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open storage and resolve the acting user, creating it on first contact.
fn open_user(config: &Config, handle: &str) -> Result<(Database, UserRecord), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let user = db.get_or_create_user(handle, &config.default_timezone, Utc::now())?;
    Ok((db, user))
}

fn user_tz(user: &UserRecord) -> Result<Tz, Box<dyn std::error::Error>> {
    Ok(resolve_tz(&user.timezone)?)
}

/// Calendar sources from the `[calendar]` config table, in label order
/// so polling order is stable across runs.
fn build_sources(config: &Config) -> Vec<Box<dyn CalendarSource>> {
    let mut labeled: Vec<_> = config.calendar.sources.iter().collect();
    labeled.sort_by_key(|(label, _)| label.clone());
    labeled
        .into_iter()
        .map(|(label, location)| {
            Box::new(JsonFeedSource::new(label, Path::new(location))) as Box<dyn CalendarSource>
        })
        .collect()
}

fn build_transport(config: &Config) -> Box<dyn MessageTransport> {
    Box::new(TelegramTransport::new(&config.telegram.bot_token))
}

fn build_tasks(config: &Config) -> Box<dyn TaskService> {
    Box::new(TodoistService::new(
        &config.todoist.api_token,
        config.todoist.project_id.as_deref(),
    ))
}

/// Single-shot async command runner.
fn block_on<F: std::future::Future>(fut: F) -> Result<F::Output, Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(fut))
}
