//! Task management commands for CLI.

use clap::Subcommand;
use timetrack_core::ledger::format_hours_minutes;

use super::{open_tracker, CmdResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a new task
    Add {
        /// Task name
        name: String,
        /// Target units (default: 1)
        #[arg(long, short, default_value_t = 1.0)]
        units: f64,
    },
    /// Add one unit of progress
    Inc {
        /// Task ID
        id: u64,
    },
    /// Remove one unit of progress
    Dec {
        /// Task ID
        id: u64,
    },
    /// Rename a task
    Rename {
        /// Task ID
        id: u64,
        /// New name
        name: String,
    },
    /// Hide a task from the default list
    Archive {
        /// Task ID
        id: u64,
        /// Unarchive instead
        #[arg(long)]
        undo: bool,
    },
    /// Delete a task (its logged time is kept)
    Delete {
        /// Task ID
        id: u64,
    },
    /// List tasks with today's time
    List {
        /// Include archived tasks
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Select the task `timer start` uses by default
    Select {
        /// Task ID; omit to clear the selection
        id: Option<u64>,
    },
}

pub fn run(action: TaskAction) -> CmdResult {
    let mut tracker = open_tracker()?;

    match action {
        TaskAction::Add { name, units } => {
            let id = tracker.add_task(&name, units)?;
            println!("Task created: {id}");
        }
        TaskAction::Inc { id } => {
            tracker.increment_task(id)?;
            if let Some(task) = tracker.tasks().get(id) {
                println!("{} {}", task.progress_label(), task.name);
            }
        }
        TaskAction::Dec { id } => {
            tracker.decrement_task(id)?;
            if let Some(task) = tracker.tasks().get(id) {
                println!("{} {}", task.progress_label(), task.name);
            }
        }
        TaskAction::Rename { id, name } => {
            tracker.rename_task(id, &name)?;
            println!("Task renamed: {id}");
        }
        TaskAction::Archive { id, undo } => {
            tracker.set_task_archived(id, !undo)?;
            println!("Task {}: {id}", if undo { "restored" } else { "archived" });
        }
        TaskAction::Delete { id } => {
            let task = tracker.delete_task(id)?;
            println!("Task deleted: {} ({})", task.id, task.name);
        }
        TaskAction::List { all, json } => {
            let today = tracker.now().date();
            let selected = tracker.selected_task_id();
            let rows: Vec<_> = tracker
                .day_summary(today)
                .into_iter()
                .filter(|(task, _)| all || !task.archived)
                .collect();

            if json {
                let out: Vec<serde_json::Value> = rows
                    .iter()
                    .map(|(task, secs)| {
                        let mut value = serde_json::to_value(task).unwrap_or_default();
                        if let Some(obj) = value.as_object_mut() {
                            obj.insert("today_seconds".into(), serde_json::json!(secs));
                            obj.insert("percent".into(), serde_json::json!(task.completion_percentage()));
                            obj.insert("selected".into(), serde_json::json!(selected == Some(task.id)));
                        }
                        value
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else if rows.is_empty() {
                println!("No tasks");
            } else {
                for (task, secs) in rows {
                    let marker = if selected == Some(task.id) { "*" } else { " " };
                    let done = if task.is_complete() { " [done]" } else { "" };
                    let archived = if task.archived { " [archived]" } else { "" };
                    println!(
                        "{marker}{:>4}  {:>7}  {:>3.0}%  {:>6}  {}{done}{archived}",
                        task.id,
                        task.progress_label(),
                        task.completion_percentage(),
                        format_hours_minutes(secs),
                        task.name
                    );
                }
            }
        }
        TaskAction::Select { id } => {
            tracker.select_task(id)?;
            match id {
                Some(id) => println!("Task selected: {id}"),
                None => println!("Selection cleared"),
            }
        }
    }
    Ok(())
}
