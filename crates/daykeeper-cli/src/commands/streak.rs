use chrono::Utc;

use daykeeper_core::format::format_streak_line;
use daykeeper_core::{get_streak, Config};

use super::{open_user, user_tz, CliResult};

pub fn run(handle: &str) -> CliResult {
    let config = Config::load()?;
    let (db, user) = open_user(&config, handle)?;
    let tz = user_tz(&user)?;
    let today = Utc::now().with_timezone(&tz).date_naive();

    let streak = get_streak(
        &db,
        user.id,
        today,
        config.scheduler.allowed_misses_per_day,
    )?;
    println!("{}", format_streak_line(&streak));
    Ok(())
}
