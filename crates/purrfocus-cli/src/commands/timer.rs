use std::io::BufRead;
use std::time::Duration;

use clap::Subcommand;
use purrfocus_core::quotes::quote_of_the_moment;
use purrfocus_core::timer::format_clock;
use purrfocus_core::{run_focus_loop, Event, FocusInput, FocusUpdate, Route};
use tokio::sync::mpsc;

use super::{print_json, CliResult, Context, TimerClaim};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current timer state as JSON
    Status,
    /// Start the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Start if paused, pause if running
    Toggle,
    /// Quit the session. Quitting a running focus session asks for
    /// confirmation and hurts your companion.
    Quit {
        /// Give up on a running focus session without asking
        #[arg(long)]
        yes: bool,
    },
    /// Dismiss a pending quit and keep focusing
    KeepGoing,
    /// Run the timer in the foreground, reading commands from stdin
    Run,
}

const RUN_HELP: &str = "commands: [enter]/t toggle, s start, p pause, q quit, y confirm quit, n keep going, x exit";

pub async fn run(action: TimerAction) -> CliResult {
    let mut ctx = Context::open().await?;
    ctx.require(Route::Timer)?;
    let show_quotes = ctx.config.show_quotes;

    for event in std::mem::take(&mut ctx.catch_up) {
        print_event(&event, show_quotes)?;
    }
    if !matches!(action, TimerAction::Status) {
        ctx.ensure_timer_free()?;
    }

    let result = match action {
        TimerAction::Status => print_json(&ctx.app.timer().snapshot()),
        TimerAction::Start => match ctx.app.start_timer() {
            Ok(event) => print_or_snapshot(&ctx, event),
            Err(e) => Err(e.into()),
        },
        TimerAction::Pause => {
            let event = ctx.app.pause_timer();
            print_or_snapshot(&ctx, event)
        }
        TimerAction::Toggle => match ctx.app.toggle_timer() {
            Ok(event) => print_or_snapshot(&ctx, event),
            Err(e) => Err(e.into()),
        },
        TimerAction::Quit { yes } => quit(&mut ctx, yes),
        TimerAction::KeepGoing => {
            let event = ctx.app.cancel_quit();
            print_or_snapshot(&ctx, event)
        }
        TimerAction::Run => run_foreground(&mut ctx).await,
    };

    ctx.save()?;
    result
}

fn quit(ctx: &mut Context, yes: bool) -> CliResult {
    let event = ctx.app.quit_timer();
    if !matches!(event, Event::QuitConfirmationRequired { .. }) {
        return print_json(&event);
    }
    if !yes {
        print_json(&event)?;
        eprintln!(
            "{} will lose health if you give up now. Run `purrfocus timer quit --yes` to quit \
             or `purrfocus timer keep-going` to continue.",
            ctx.app.companion().name
        );
        return Ok(());
    }
    for event in ctx.app.confirm_quit() {
        print_json(&event)?;
    }
    let companion = ctx.app.companion();
    if !companion.is_alive {
        eprintln!(
            "{} didn't make it. Adopt a new companion with `purrfocus companion adopt`.",
            companion.name
        );
    }
    Ok(())
}

fn print_or_snapshot(ctx: &Context, event: Option<Event>) -> CliResult {
    match event {
        Some(event) => print_json(&event),
        None => print_json(&ctx.app.timer().snapshot()),
    }
}

fn print_event(event: &Event, show_quotes: bool) -> CliResult {
    print_json(event)?;
    if let Event::SyncFailed { message, .. } = event {
        eprintln!("warning: focus time was not saved: {message}");
    }
    if show_quotes && matches!(event, Event::PhaseChanged { .. }) {
        eprintln!("{}", quote_of_the_moment());
    }
    Ok(())
}

fn parse_input(line: &str) -> Option<FocusInput> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "t" | "toggle" => Some(FocusInput::Toggle),
        "s" | "start" => Some(FocusInput::Start),
        "p" | "pause" => Some(FocusInput::Pause),
        "q" | "quit" => Some(FocusInput::Quit),
        "y" | "yes" => Some(FocusInput::ConfirmQuit),
        "n" | "no" | "keep-going" => Some(FocusInput::CancelQuit),
        _ => None,
    }
}

/// Feed stdin lines to the focus loop. A plain thread, so a pending read
/// never keeps the runtime from shutting down.
fn spawn_stdin_reader(tx: mpsc::Sender<FocusInput>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if matches!(line.trim(), "x" | "exit") {
                break;
            }
            match parse_input(&line) {
                Some(input) => {
                    if tx.blocking_send(input).is_err() {
                        break;
                    }
                }
                None => eprintln!("{RUN_HELP}"),
            }
        }
    });
}

async fn run_foreground(ctx: &mut Context) -> CliResult {
    let show_quotes = ctx.config.show_quotes;
    let claim = TimerClaim::new(&ctx.db)?;
    claim.persist(&ctx.app)?;

    let (tx, rx) = mpsc::channel(16);
    spawn_stdin_reader(tx);

    print_json(&ctx.app.timer().snapshot())?;
    eprintln!("{RUN_HELP}");

    let focus = run_focus_loop(&mut ctx.app, rx, |app, update| {
        match update {
            FocusUpdate::Tick { time_left_secs } => {
                eprint!("\r{}  ", format_clock(time_left_secs));
            }
            FocusUpdate::Event(event) => {
                eprintln!();
                if let Err(e) = print_event(event, show_quotes) {
                    tracing::warn!(error = %e, "could not print event");
                }
                if let Event::QuitConfirmationRequired { .. } = event {
                    eprintln!("give up on this session? y = quit, n = keep going");
                }
            }
            FocusUpdate::Rejected(_, e) => eprintln!("error: {e}"),
        }
        if let Err(e) = claim.persist(app) {
            tracing::warn!(error = %e, "could not save timer state");
        }
    });

    let heartbeat = async {
        let mut beat = tokio::time::interval(Duration::from_secs(1));
        loop {
            beat.tick().await;
            if let Err(e) = claim.heartbeat() {
                tracing::warn!(error = %e, "could not refresh timer claim");
            }
        }
    };

    tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => eprintln!("interrupted"),
        _ = focus => {}
        _ = heartbeat => {}
    }
    claim.release()?;
    ctx.reset_anchor();

    let timer = ctx.app.timer();
    eprintln!("{} {}", timer.phase().label(), timer.clock());
    Ok(())
}
