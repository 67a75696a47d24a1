use daykeeper_core::clock::resolve_tz;
use daykeeper_core::Config;

use super::{open_user, CliResult};

pub fn run(handle: &str, zone: &str) -> CliResult {
    // Reject unknown zones before touching storage.
    resolve_tz(zone)?;

    let config = Config::load()?;
    let (db, user) = open_user(&config, handle)?;
    db.set_timezone(user.id, zone)?;
    println!("Timezone set to {zone}.");
    Ok(())
}
