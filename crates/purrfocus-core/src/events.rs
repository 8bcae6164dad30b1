use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::Phase;

/// Every timer state change produces an Event.
/// `AppState` consumes them to update the companion and the habit log;
/// front ends render them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    /// A work countdown reached zero.
    WorkSessionCompleted {
        focus_minutes: u32,
        /// Sessions counted since the last long break, including this one.
        sessions: u32,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// Quitting now would abandon a running focus session.
    QuitConfirmationRequired {
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    QuitCancelled {
        at: DateTime<Utc>,
    },
    /// The user confirmed giving up on the session.
    SessionAbandoned {
        time_left_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    /// A store call triggered by a transition failed. Local state was not
    /// updated for this operation.
    SyncFailed {
        operation: String,
        message: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: Phase,
        label: String,
        is_running: bool,
        time_left_secs: u64,
        total_secs: u64,
        clock: String,
        progress: f64,
        sessions: u32,
        awaiting_quit_confirmation: bool,
        at: DateTime<Utc>,
    },
}
