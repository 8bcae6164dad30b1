use clap::Subcommand;
use purrfocus_core::companion::MAX_HEALTH;
use purrfocus_core::{CompanionState, Route};
use serde_json::json;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum CompanionAction {
    /// Show your companion's health and streak
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Adopt a new companion, replacing the current one
    Adopt {
        /// Name for the new companion (defaults to the configured name)
        #[arg(long)]
        name: Option<String>,
    },
}

pub async fn run(action: CompanionAction) -> CliResult {
    let mut ctx = Context::open().await?;
    ctx.require(Route::Timer)?;

    match action {
        CompanionAction::Status { json } => {
            let companion = ctx.app.companion();
            if json {
                print_json(&json!({
                    "companion": companion,
                    "mood": companion.mood(),
                }))?;
            } else {
                print_status(companion);
            }
        }
        CompanionAction::Adopt { name } => {
            ctx.ensure_timer_free()?;
            let name = name.unwrap_or_else(|| ctx.config.companion.default_name.clone());
            let companion = ctx.app.reset_companion(&name);
            println!("welcome home, {}!", companion.name);
        }
    }

    ctx.save()?;
    Ok(())
}

fn print_status(companion: &CompanionState) {
    const WIDTH: usize = 20;
    let filled = (usize::from(companion.health) * WIDTH / usize::from(MAX_HEALTH)).min(WIDTH);
    println!(
        "{} is {} [{}{}] {}/{}",
        companion.name,
        companion.mood().description(),
        "#".repeat(filled),
        "-".repeat(WIDTH.saturating_sub(filled)),
        companion.health,
        MAX_HEALTH
    );
    println!("focus streak: {}", companion.focus_streak);
    if !companion.is_alive {
        println!("adopt a new companion with `purrfocus companion adopt`");
    }
}
