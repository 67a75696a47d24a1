use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "daykeeper", version, about = "Daykeeper CLI")]
struct Cli {
    /// Chat handle of the user to act as.
    #[arg(long, global = true, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler loop
    Run,
    /// Day status for today
    Status {
        /// Print the full status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Current and best streak
    Streak,
    /// Today's event index
    Events {
        #[command(subcommand)]
        action: commands::events::EventsAction,
    },
    /// Set the user's timezone
    Tz {
        /// IANA zone name, e.g. America/New_York
        zone: String,
    },
    /// Daily notes
    Note {
        #[command(subcommand)]
        action: commands::note::NoteAction,
    },
    /// Record an inbound reply against the latest pending prompt
    Reply {
        #[command(subcommand)]
        action: commands::reply::ReplyAction,
    },
    /// Tracked-people roster
    People {
        #[command(subcommand)]
        action: commands::people::PeopleAction,
    },
    /// Remote task list
    Todo {
        #[command(subcommand)]
        action: commands::todo::TodoAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run => commands::run::run(),
        Commands::Status { json } => commands::status::run(&cli.user, json),
        Commands::Streak => commands::streak::run(&cli.user),
        Commands::Events { action } => commands::events::run(&cli.user, action),
        Commands::Tz { zone } => commands::tz::run(&cli.user, &zone),
        Commands::Note { action } => commands::note::run(&cli.user, action),
        Commands::Reply { action } => commands::reply::run(&cli.user, action),
        Commands::People { action } => commands::people::run(&cli.user, action),
        Commands::Todo { action } => commands::todo::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_user_flag() {
        let cli = Cli::try_parse_from(["daykeeper", "--user", "alice", "status"]).unwrap();
        assert_eq!(cli.user, "alice");
        assert!(matches!(cli.command, Commands::Status { json: false }));
    }

    #[test]
    fn user_defaults_to_local() {
        let cli = Cli::try_parse_from(["daykeeper", "streak"]).unwrap();
        assert_eq!(cli.user, "local");
    }

    #[test]
    fn note_add_collects_trailing_words() {
        let cli =
            Cli::try_parse_from(["daykeeper", "note", "add", "remember", "the", "milk"]).unwrap();
        match cli.command {
            Commands::Note {
                action: commands::note::NoteAction::Add { text },
            } => assert_eq!(text.join(" "), "remember the milk"),
            _ => panic!("wrong command"),
        }
    }
}
