//! Time log reports and exports.

use chrono::{Datelike, Duration, NaiveDate};
use clap::Subcommand;
use std::path::PathBuf;
use timetrack_core::ledger::format_hours_minutes;
use timetrack_core::ExportFormat;

use super::{open_tracker, CmdResult};

#[derive(Subcommand)]
pub enum LogAction {
    /// Per-task time for today
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Daily totals for the last seven days
    Week {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Daily totals for a month
    Month {
        /// Month as YYYY-MM (default: current month)
        month: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export every log entry with task names
    Export {
        /// json or csv
        #[arg(long, default_value = "json")]
        format: ExportFormat,
        /// Output file (default: tracker_time_logs.<format> in the export directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

pub fn run(action: LogAction) -> CmdResult {
    let mut tracker = open_tracker()?;
    let today = tracker.now().date();

    match action {
        LogAction::Today { json } => {
            let rows: Vec<_> = tracker
                .day_summary(today)
                .into_iter()
                .filter(|(_, secs)| *secs > 0.0)
                .collect();
            if json {
                let out: Vec<serde_json::Value> = rows
                    .iter()
                    .map(|(task, secs)| {
                        serde_json::json!({ "task_id": task.id, "name": task.name, "seconds": secs })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else if rows.is_empty() {
                println!("Nothing logged today");
            } else {
                for (task, secs) in rows {
                    println!("{:>6}  {}", format_hours_minutes(secs), task.name);
                }
            }
        }
        LogAction::Week { json } => {
            let from = today - Duration::days(6);
            let totals = tracker.ledger().daily_totals(from, today);
            if json {
                let out: Vec<serde_json::Value> = totals
                    .iter()
                    .map(|(date, secs)| serde_json::json!({ "date": date, "seconds": secs }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for (date, secs) in totals {
                    println!("{}  {:>6}", date.format("%a %m-%d"), format_hours_minutes(secs));
                }
            }
        }
        LogAction::Month { month, json } => {
            let (year, month) = match month {
                Some(m) => parse_month(&m)?,
                None => (today.year(), today.month()),
            };
            let totals = tracker.ledger().month_totals(year, month);
            if json {
                let out: Vec<serde_json::Value> = totals
                    .iter()
                    .map(|(day, secs)| serde_json::json!({ "day": day, "seconds": secs }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else if totals.is_empty() {
                println!("Nothing logged in {year}-{month:02}");
            } else {
                for (day, secs) in totals {
                    println!("{year}-{month:02}-{day:02}  {:>6}", format_hours_minutes(secs));
                }
            }
        }
        LogAction::Export { format, output } => {
            let path = tracker.export(format, output.as_deref())?;
            println!("{} written to {}", format.to_string().to_uppercase(), path.display());
        }
    }
    Ok(())
}

fn parse_month(input: &str) -> Result<(i32, u32), Box<dyn std::error::Error>> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", input.trim()), "%Y-%m-%d")
        .map_err(|_| format!("invalid month '{input}', expected YYYY-MM"))?;
    Ok((date.year(), date.month()))
}
