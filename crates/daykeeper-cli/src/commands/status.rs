use chrono::Utc;

use daykeeper_core::status::format_status_line;
use daykeeper_core::{get_day_status, Config};

use super::{open_user, user_tz, CliResult};

pub fn run(handle: &str, json: bool) -> CliResult {
    let config = Config::load()?;
    let (db, user) = open_user(&config, handle)?;
    let tz = user_tz(&user)?;
    let today = Utc::now().with_timezone(&tz).date_naive();

    let status = get_day_status(
        &db,
        user.id,
        today,
        config.scheduler.allowed_misses_per_day,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", format_status_line(&status));
    }
    Ok(())
}
