use chrono::Utc;
use clap::Subcommand;

use daykeeper_core::Config;

use super::{open_user, user_tz, CliResult};

#[derive(Subcommand)]
pub enum NoteAction {
    /// Save a note on today's log
    Add {
        /// Note text
        text: Vec<String>,
    },
    /// Print today's notes
    List,
}

pub fn run(handle: &str, action: NoteAction) -> CliResult {
    let config = Config::load()?;
    let (db, user) = open_user(&config, handle)?;
    let tz = user_tz(&user)?;
    let now = Utc::now();
    let today = now.with_timezone(&tz).date_naive();

    match action {
        NoteAction::Add { text } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                eprintln!("note text can't be empty");
                std::process::exit(1);
            }
            db.add_note(user.id, today, now, text.trim())?;
            println!("Saved.");
        }
        NoteAction::List => {
            let notes = db.notes_for_day(user.id, today)?;
            if notes.is_empty() {
                println!("No notes today.");
            } else {
                for (i, n) in notes.iter().enumerate() {
                    println!("{}) {n}", i + 1);
                }
            }
        }
    }
    Ok(())
}
