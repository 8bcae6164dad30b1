//! Foreground focus loop.
//!
//! One task owns the [`AppState`] and the only [`Countdown`]. It waits on
//! either the next tick or the next user input, applies it, reports the
//! resulting events, then re-synchronises the countdown with the engine:
//! running means an active countdown, anything else drops it.

use tokio::sync::mpsc;

use crate::app_state::AppState;
use crate::error::CoreError;
use crate::events::Event;
use crate::timer::Countdown;

/// Buttons on the timer screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusInput {
    Start,
    Pause,
    Toggle,
    Quit,
    ConfirmQuit,
    /// "Keep going" on the quit prompt.
    CancelQuit,
}

/// Something the front end should render.
#[derive(Debug)]
pub enum FocusUpdate<'a> {
    Event(&'a Event),
    /// A second passed without a transition.
    Tick { time_left_secs: u64 },
    /// The input was refused, e.g. starting while the companion is gone.
    Rejected(FocusInput, &'a CoreError),
}

enum Step {
    Tick,
    Input(FocusInput),
    Closed,
}

/// Run until the input channel closes. `on_update` sees the state after
/// each step alongside what changed.
pub async fn run_focus_loop<F>(
    app: &mut AppState,
    mut inputs: mpsc::Receiver<FocusInput>,
    mut on_update: F,
) where
    F: FnMut(&AppState, FocusUpdate<'_>),
{
    let mut countdown = Countdown::new();
    sync_countdown(&mut countdown, app);

    loop {
        let step = tokio::select! {
            _ = countdown.next_tick() => Step::Tick,
            input = inputs.recv() => match input {
                Some(input) => Step::Input(input),
                None => Step::Closed,
            },
        };

        let events = match step {
            Step::Closed => break,
            Step::Tick => {
                let events = app.tick_timer().await;
                if events.is_empty() {
                    let time_left_secs = app.timer().time_left_secs();
                    on_update(app, FocusUpdate::Tick { time_left_secs });
                }
                events
            }
            Step::Input(input) => match apply_input(app, input) {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(?input, error = %e, "focus input rejected");
                    on_update(app, FocusUpdate::Rejected(input, &e));
                    Vec::new()
                }
            },
        };

        for event in &events {
            on_update(app, FocusUpdate::Event(event));
        }
        sync_countdown(&mut countdown, app);
    }
    tracing::debug!("focus loop stopped");
}

fn apply_input(app: &mut AppState, input: FocusInput) -> Result<Vec<Event>, CoreError> {
    let events = match input {
        FocusInput::Start => app.start_timer()?.into_iter().collect(),
        FocusInput::Pause => app.pause_timer().into_iter().collect(),
        FocusInput::Toggle => app.toggle_timer()?.into_iter().collect(),
        FocusInput::Quit => vec![app.quit_timer()],
        FocusInput::ConfirmQuit => app.confirm_quit(),
        FocusInput::CancelQuit => app.cancel_quit().into_iter().collect(),
    };
    Ok(events)
}

fn sync_countdown(countdown: &mut Countdown, app: &AppState) {
    if app.timer().is_running() {
        countdown.start();
    } else {
        countdown.stop();
    }
}
