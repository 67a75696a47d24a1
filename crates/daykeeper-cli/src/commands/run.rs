use daykeeper_core::{Config, Database, Scheduler};

use super::{build_sources, build_tasks, build_transport, block_on, CliResult};

pub fn run() -> CliResult {
    let config = Config::load()?;
    let db = Database::open()?;

    let mut scheduler = Scheduler::new(
        db,
        config.clone(),
        build_transport(&config),
        build_tasks(&config),
        build_sources(&config),
    );

    block_on(async move { scheduler.run().await })??;
    Ok(())
}
