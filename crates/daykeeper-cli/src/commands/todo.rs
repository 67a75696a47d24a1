use chrono::Utc;
use chrono_tz::Tz;
use clap::Subcommand;

use daykeeper_core::clock::resolve_tz;
use daykeeper_core::format::format_tasks_numbered;
use daykeeper_core::Config;

use super::{block_on, build_tasks, CliResult};

#[derive(Subcommand)]
pub enum TodoAction {
    /// Add a task
    Add {
        /// Task content
        content: Vec<String>,
        /// Natural-language due string, e.g. "tomorrow 5pm"
        #[arg(long)]
        due: Option<String>,
    },
    /// Print active tasks, numbered
    List,
    /// Close a task by its number from the current list
    Done {
        /// 1-based number from `todo list`
        number: usize,
    },
}

pub fn run(action: TodoAction) -> CliResult {
    let config = Config::load()?;
    let service = build_tasks(&config);
    let tz: Tz = resolve_tz(&config.default_timezone)?;
    let now = Utc::now();

    match action {
        TodoAction::Add { content, due } => {
            let content = content.join(" ");
            if content.trim().is_empty() {
                eprintln!("task content can't be empty");
                std::process::exit(1);
            }
            let task = block_on(service.add_task(content.trim(), due.as_deref()))??;
            match due {
                Some(d) => println!("Added task: {} (due {d})", task.content),
                None => println!("Added task: {}", task.content),
            }
        }
        TodoAction::List => {
            let tasks = block_on(service.list_active_tasks())??;
            println!("{}", format_tasks_numbered(&tasks, tz, now));
        }
        TodoAction::Done { number } => {
            // Re-fetch so the number refers to the list as printed now.
            let tasks = block_on(service.list_active_tasks())??;
            if number == 0 || number > tasks.len() {
                eprintln!(
                    "task number {number} doesn't exist; run `todo list` ({} active)",
                    tasks.len()
                );
                std::process::exit(1);
            }
            let task = &tasks[number - 1];
            block_on(service.close_task(&task.id))??;
            println!("Completed: {}) {}", number, task.content);
        }
    }
    Ok(())
}
