use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "purrfocus", version, about = "Pomodoro timer with a companion cat")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign up, sign in and out
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Your focus companion
    Companion {
        #[command(subcommand)]
        action: commands::companion::CompanionAction,
    },
    /// Notes
    Notes {
        #[command(subcommand)]
        action: commands::notes::NotesAction,
    },
    /// Focus habit dashboard
    Habits {
        #[command(subcommand)]
        action: commands::habits::HabitsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print a shell completion script
    Completions { shell: Shell },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PURRFOCUS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Auth { action } => commands::auth::run(action).await,
        Commands::Timer { action } => commands::timer::run(action).await,
        Commands::Companion { action } => commands::companion::run(action).await,
        Commands::Notes { action } => commands::notes::run(action).await,
        Commands::Habits { action } => commands::habits::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "purrfocus", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
