use chrono::Utc;
use clap::Subcommand;
use purrfocus_core::habits::DAILY_TARGET_MIN;
use purrfocus_core::{DailyFocus, Route};

use super::{print_json, CliResult, Context};

const BAR_WIDTH: f64 = 30.0;

#[derive(Subcommand)]
pub enum HabitsAction {
    /// Focus minutes and sessions completed today
    Today {
        #[arg(long)]
        json: bool,
    },
    /// The last seven days, oldest first
    Week {
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(action: HabitsAction) -> CliResult {
    let mut ctx = Context::open().await?;
    ctx.require(Route::Habits)?;
    let summary = ctx.app.habit_summary(Utc::now().date_naive());

    match action {
        HabitsAction::Today { json } => {
            if json {
                print_json(&summary.today)?;
            } else {
                println!(
                    "today: {} min focused, {} sessions",
                    summary.today.focus_minutes, summary.today.completed_sessions
                );
                println!("{}", bar(&summary.today));
            }
        }
        HabitsAction::Week { json } => {
            if json {
                print_json(&summary)?;
            } else {
                for day in &summary.last_7_days {
                    println!(
                        "{}  {}  {:>4} min",
                        day.date.format("%a %m-%d"),
                        bar(day),
                        day.focus_minutes
                    );
                }
                println!("weekly average: {} min/day", summary.weekly_average_min);
            }
        }
    }

    ctx.save()?;
    Ok(())
}

/// Progress toward the daily target.
fn bar(day: &DailyFocus) -> String {
    let filled = (day.fill_ratio() * BAR_WIDTH).round() as usize;
    let empty = BAR_WIDTH as usize - filled;
    format!("[{}{}] of {DAILY_TARGET_MIN}", "#".repeat(filled), " ".repeat(empty))
}
