use std::time::Duration;

use chrono::Utc;
use clap::Subcommand;

use daykeeper_core::clock::{is_after_local_hour, SystemClock};
use daykeeper_core::format::format_events;
use daykeeper_core::{get_today_events, Config};

use super::{block_on, build_sources, open_user, user_tz, CliResult};

// Refresh is a calendar re-read; the original workflow only allows it
// once the day's plan is settled.
const REFRESH_OPEN_HOUR: u32 = 16;

#[derive(Subcommand)]
pub enum EventsAction {
    /// Print today's numbered event index
    Today,
    /// Re-read the calendar feeds and rebuild today's index
    Refresh,
}

pub fn run(handle: &str, action: EventsAction) -> CliResult {
    let config = Config::load()?;
    let (mut db, mut user) = open_user(&config, handle)?;
    let tz = user_tz(&user)?;
    let now = Utc::now();
    let today = now.with_timezone(&tz).date_naive();
    let sources = build_sources(&config);
    let timeout = Duration::from_secs(config.scheduler.call_timeout_secs);

    if let EventsAction::Refresh = action {
        if !is_after_local_hour(&SystemClock, tz, REFRESH_OPEN_HOUR) {
            println!("events refresh is only available after {REFRESH_OPEN_HOUR}:00 local time.");
            return Ok(());
        }
        // Force the read-through below to rebuild; it clears the flag
        // once the new index is in place.
        db.set_needs_reindex(user.id, true)?;
        user.needs_reindex = true;
    }

    let (entries, outcome) = block_on(get_today_events(
        &mut db,
        &sources,
        &user,
        tz,
        today,
        config.calendar.include_all_day,
        timeout,
        now,
    ))??;

    for w in &outcome.warnings {
        eprintln!("warning: source '{}': {}", w.source, w.message);
    }
    println!("Today's events:\n{}", format_events(&entries, tz));
    Ok(())
}
