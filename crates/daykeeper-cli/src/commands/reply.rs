use chrono::Utc;
use clap::Subcommand;

use daykeeper_core::{on_photo, on_text, Config, IntakeOutcome};

use super::{open_user, user_tz, CliResult};

#[derive(Subcommand)]
pub enum ReplyAction {
    /// Text reply
    Text {
        /// Reply text
        text: Vec<String>,
    },
    /// Photo reply
    Photo {
        /// Attachment reference (file id, path, URL)
        attachment: String,
        /// Optional caption
        #[arg(long)]
        caption: Option<String>,
    },
}

pub fn run(handle: &str, action: ReplyAction) -> CliResult {
    let config = Config::load()?;
    let (db, user) = open_user(&config, handle)?;
    let tz = user_tz(&user)?;
    let now = Utc::now();
    let today = now.with_timezone(&tz).date_naive();

    let outcome = match action {
        ReplyAction::Text { text } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                eprintln!("reply text can't be empty");
                std::process::exit(1);
            }
            on_text(&db, user.id, today, now, text.trim())?
        }
        ReplyAction::Photo {
            attachment,
            caption,
        } => on_photo(&db, user.id, today, now, &attachment, caption.as_deref())?,
    };

    match outcome {
        IntakeOutcome::Acknowledged { kind, reference } => {
            println!("Logged against pending {kind} check-in '{reference}'.");
        }
        IntakeOutcome::SavedAsNote => println!("No pending check-in; saved as a note."),
    }
    Ok(())
}
