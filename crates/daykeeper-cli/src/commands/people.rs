use chrono::Utc;
use clap::Subcommand;

use daykeeper_core::format::format_people;
use daykeeper_core::Config;

use super::{open_user, user_tz, CliResult};

#[derive(Subcommand)]
pub enum PeopleAction {
    /// Add or update a tracked person
    Add {
        /// Person's name
        name: String,
        /// Priority, 1..10, higher sorts first
        #[arg(long, default_value = "5")]
        priority: i64,
        /// One-line note
        #[arg(long, default_value = "(quick add)")]
        note: String,
        /// Days already tracked; starts the day counter today
        #[arg(long)]
        days: Option<i64>,
    },
    /// Print the roster
    List,
    /// Remove a person
    Del {
        /// Person's name
        name: String,
    },
}

pub fn run(handle: &str, action: PeopleAction) -> CliResult {
    let config = Config::load()?;
    let (db, user) = open_user(&config, handle)?;
    let tz = user_tz(&user)?;
    let now = Utc::now();
    let today = now.with_timezone(&tz).date_naive();

    match action {
        PeopleAction::Add {
            name,
            priority,
            note,
            days,
        } => {
            if !(1..=10).contains(&priority) {
                eprintln!("priority must be 1..10");
                std::process::exit(1);
            }
            let start_day = days.map(|_| today);
            db.upsert_person(user.id, &name, priority, &note, start_day, days, now)?;
            println!("Tracking: {name} (P{priority})");
        }
        PeopleAction::List => {
            let people = db.list_people(user.id)?;
            println!("{}", format_people(&people, today));
        }
        PeopleAction::Del { name } => {
            if db.delete_person(user.id, &name)? {
                println!("Deleted: {name}");
            } else {
                println!("Couldn't find person: {name}");
            }
        }
    }
    Ok(())
}
