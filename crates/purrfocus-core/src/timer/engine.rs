//! Focus-session state machine.
//!
//! The engine is tick-driven and owns no clock or thread. The caller invokes
//! `tick()` once per elapsed second while the timer runs (see
//! [`super::Countdown`] and [`crate::focus`]).
//!
//! ## State Transitions
//!
//! ```text
//! Work(paused) <-> Work(running) --expire--> Break(paused) | LongBreak(paused)
//! Break(paused) <-> Break(running) --expire--> Work(paused)
//! LongBreak(paused) <-> LongBreak(running) --expire--> Work(paused)
//! ```
//!
//! Every transition stops the countdown. `quit()` while focusing asks for
//! confirmation instead of resetting.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::settings::{Phase, Settings};
use crate::events::Event;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEngine {
    settings: Settings,
    phase: Phase,
    is_running: bool,
    /// Remaining seconds in the current phase.
    time_left_secs: u64,
    /// Length the current phase started with.
    #[serde(default)]
    phase_total_secs: u64,
    /// Completed work sessions since the last long break.
    sessions: u32,
    #[serde(default)]
    awaiting_quit_confirmation: bool,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl TimerEngine {
    /// Create an engine in the initial state: Work, paused, full work
    /// duration, no sessions.
    pub fn new(settings: Settings) -> Self {
        let work_secs = settings.duration_secs(Phase::Work);
        Self {
            time_left_secs: work_secs,
            phase_total_secs: work_secs,
            settings,
            phase: Phase::Work,
            is_running: false,
            sessions: 0,
            awaiting_quit_confirmation: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_work(&self) -> bool {
        self.phase.is_work()
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn time_left_secs(&self) -> u64 {
        self.time_left_secs
    }

    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn awaiting_quit_confirmation(&self) -> bool {
        self.awaiting_quit_confirmation
    }

    /// Full length of the current phase, as it was when the phase began.
    pub fn total_secs(&self) -> u64 {
        self.phase_total_secs
    }

    /// 0.0 .. 1.0 progress within the current phase.
    pub fn progress(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        (1.0 - (self.time_left_secs as f64 / total as f64)).clamp(0.0, 1.0)
    }

    pub fn clock(&self) -> String {
        format_clock(self.time_left_secs)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            phase: self.phase,
            label: self.phase.label().to_string(),
            is_running: self.is_running,
            time_left_secs: self.time_left_secs,
            total_secs: self.total_secs(),
            clock: self.clock(),
            progress: self.progress(),
            sessions: self.sessions,
            awaiting_quit_confirmation: self.awaiting_quit_confirmation,
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.is_running || self.time_left_secs == 0 {
            return None;
        }
        self.is_running = true;
        Some(Event::TimerStarted {
            phase: self.phase,
            time_left_secs: self.time_left_secs,
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.is_running {
            return None;
        }
        self.is_running = false;
        Some(Event::TimerPaused {
            phase: self.phase,
            time_left_secs: self.time_left_secs,
            at: Utc::now(),
        })
    }

    /// Play/pause button.
    pub fn toggle(&mut self) -> Option<Event> {
        if self.is_running {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Advance one second. Returns the transition events when the phase
    /// expires; empty otherwise. Ignored while paused.
    pub fn tick(&mut self) -> Vec<Event> {
        if !self.is_running || self.time_left_secs == 0 {
            return Vec::new();
        }
        self.time_left_secs -= 1;
        if self.time_left_secs == 0 {
            self.on_expire()
        } else {
            Vec::new()
        }
    }

    /// Apply up to `secs` ticks, stopping at the first phase boundary.
    pub fn advance_by(&mut self, secs: u64) -> Vec<Event> {
        let mut events = Vec::new();
        let mut remaining = secs;
        while remaining > 0 && self.is_running {
            events.extend(self.tick());
            remaining -= 1;
        }
        events
    }

    /// Quit button. Abandoning a running focus session needs confirmation;
    /// anything else resets right away.
    pub fn quit(&mut self) -> Event {
        if self.is_work() && self.is_running {
            self.awaiting_quit_confirmation = true;
            return Event::QuitConfirmationRequired {
                time_left_secs: self.time_left_secs,
                at: Utc::now(),
            };
        }
        self.reset()
    }

    /// Give up on the current session. The returned `SessionAbandoned` event
    /// carries the penalty for the companion; the timer is reset. Without a
    /// pending confirmation this does nothing.
    pub fn confirm_quit(&mut self) -> Vec<Event> {
        if !self.awaiting_quit_confirmation {
            return Vec::new();
        }
        let abandoned = Event::SessionAbandoned {
            time_left_secs: self.time_left_secs,
            at: Utc::now(),
        };
        vec![abandoned, self.reset()]
    }

    /// "Keep going": dismiss a pending quit confirmation.
    pub fn cancel_quit(&mut self) -> Option<Event> {
        if !self.awaiting_quit_confirmation {
            return None;
        }
        self.awaiting_quit_confirmation = false;
        Some(Event::QuitCancelled { at: Utc::now() })
    }

    /// Replace the settings. A countdown that has begun keeps its length and
    /// the new durations apply from the next transition or reset. A phase
    /// that is paused and untouched is resized right away.
    pub fn set_settings(&mut self, settings: Settings) {
        let untouched = !self.is_running && self.time_left_secs == self.phase_total_secs;
        self.settings = settings;
        if untouched {
            self.begin_phase(self.phase);
        }
    }

    /// Repair a state restored from storage so the engine invariants hold:
    /// valid settings, a phase length covering the time left, and a quit
    /// prompt only on a running focus session.
    pub fn repaired(mut self) -> Self {
        if self.settings.validate().is_err() {
            tracing::warn!(settings = ?self.settings, "restored timer had invalid settings");
            self.settings = Settings::default();
        }
        if self.time_left_secs == 0 {
            self.is_running = false;
            self.begin_phase(self.phase);
        }
        if self.phase_total_secs < self.time_left_secs {
            self.phase_total_secs = self
                .settings
                .duration_secs(self.phase)
                .max(self.time_left_secs);
        }
        if !(self.is_work() && self.is_running) {
            self.awaiting_quit_confirmation = false;
        }
        self
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.time_left_secs = self.settings.duration_secs(phase);
        self.phase_total_secs = self.time_left_secs;
    }

    fn reset(&mut self) -> Event {
        self.is_running = false;
        self.begin_phase(Phase::Work);
        self.sessions = 0;
        self.awaiting_quit_confirmation = false;
        Event::TimerReset { at: Utc::now() }
    }

    fn on_expire(&mut self) -> Vec<Event> {
        let at = Utc::now();
        let from = self.phase;
        let mut events = Vec::with_capacity(2);

        let to = if from.is_work() {
            self.sessions += 1;
            events.push(Event::WorkSessionCompleted {
                focus_minutes: self.settings.work_duration,
                sessions: self.sessions,
                at,
            });
            if self.sessions >= self.settings.sessions_before_long_break {
                self.sessions = 0;
                Phase::LongBreak
            } else {
                Phase::Break
            }
        } else {
            Phase::Work
        };

        self.is_running = false;
        self.awaiting_quit_confirmation = false;
        self.begin_phase(to);
        tracing::debug!(?from, ?to, sessions = self.sessions, "phase expired");

        events.push(Event::PhaseChanged {
            from,
            to,
            duration_secs: self.time_left_secs,
            at,
        });
        events
    }
}

/// `MM:SS`, minutes not wrapped at 60.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn settings(work: u32, brk: u32, long: u32, before_long: u32) -> Settings {
        Settings::new(work, brk, long, before_long).unwrap()
    }

    /// Run the current phase to completion.
    fn finish_phase(engine: &mut TimerEngine) -> Vec<Event> {
        engine.start();
        let secs = engine.time_left_secs();
        engine.advance_by(secs)
    }

    #[test]
    fn initial_state_is_paused_work() {
        let engine = TimerEngine::default();
        assert_eq!(engine.phase(), Phase::Work);
        assert!(!engine.is_running());
        assert_eq!(engine.time_left_secs(), 25 * 60);
        assert_eq!(engine.sessions(), 0);
    }

    #[test]
    fn start_and_pause_are_idempotent() {
        let mut engine = TimerEngine::default();
        assert!(engine.pause().is_none());
        assert!(engine.start().is_some());
        assert!(engine.start().is_none());
        assert!(engine.is_running());
        assert!(engine.pause().is_some());
        assert!(engine.pause().is_none());
        assert!(!engine.is_running());
    }

    #[test]
    fn tick_only_counts_down_while_running() {
        let mut engine = TimerEngine::default();
        assert!(engine.tick().is_empty());
        assert_eq!(engine.time_left_secs(), 1500);

        engine.start();
        engine.tick();
        engine.tick();
        assert_eq!(engine.time_left_secs(), 1498);

        engine.pause();
        engine.tick();
        assert_eq!(engine.time_left_secs(), 1498);
    }

    #[test]
    fn work_expiry_moves_to_break_and_stops() {
        let mut engine = TimerEngine::new(settings(1, 2, 3, 4));
        let events = finish_phase(&mut engine);

        assert_eq!(engine.phase(), Phase::Break);
        assert!(!engine.is_running());
        assert_eq!(engine.time_left_secs(), 120);
        assert_eq!(engine.sessions(), 1);
        assert!(matches!(
            events[0],
            Event::WorkSessionCompleted { focus_minutes: 1, sessions: 1, .. }
        ));
        assert!(matches!(
            events[1],
            Event::PhaseChanged { from: Phase::Work, to: Phase::Break, duration_secs: 120, .. }
        ));
    }

    #[test]
    fn break_expiry_returns_to_work() {
        let mut engine = TimerEngine::new(settings(1, 1, 1, 4));
        finish_phase(&mut engine);
        let events = finish_phase(&mut engine);
        assert_eq!(engine.phase(), Phase::Work);
        assert_eq!(engine.time_left_secs(), 60);
        assert_eq!(engine.sessions(), 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn fourth_session_earns_long_break() {
        let mut engine = TimerEngine::new(settings(25, 5, 15, 4));
        for _ in 0..3 {
            finish_phase(&mut engine);
            assert_eq!(engine.phase(), Phase::Break);
            finish_phase(&mut engine);
            assert_eq!(engine.phase(), Phase::Work);
        }
        finish_phase(&mut engine);
        assert_eq!(engine.phase(), Phase::LongBreak);
        assert_eq!(engine.time_left_secs(), 900);
        assert_eq!(engine.sessions(), 0);

        finish_phase(&mut engine);
        assert_eq!(engine.phase(), Phase::Work);
        assert_eq!(engine.time_left_secs(), 1500);
    }

    #[test]
    fn quit_while_focusing_requires_confirmation() {
        let mut engine = TimerEngine::default();
        engine.start();
        engine.tick();

        let event = engine.quit();
        assert!(matches!(event, Event::QuitConfirmationRequired { .. }));
        assert!(engine.is_running());
        assert!(engine.awaiting_quit_confirmation());
        assert_eq!(engine.time_left_secs(), 1499);

        assert!(engine.cancel_quit().is_some());
        assert!(!engine.awaiting_quit_confirmation());
        assert!(engine.cancel_quit().is_none());
    }

    #[test]
    fn quit_while_paused_resets_immediately() {
        let mut engine = TimerEngine::default();
        engine.start();
        engine.tick();
        engine.pause();
        assert!(matches!(engine.quit(), Event::TimerReset { .. }));
        assert_eq!(engine, TimerEngine::default());
    }

    #[test]
    fn quit_on_break_resets_even_while_running() {
        let mut engine = TimerEngine::new(settings(1, 5, 15, 4));
        finish_phase(&mut engine);
        engine.start();
        assert!(engine.is_running());
        assert!(!engine.is_work());

        assert!(matches!(engine.quit(), Event::TimerReset { .. }));
        assert_eq!(engine.phase(), Phase::Work);
        assert!(!engine.is_running());
        assert_eq!(engine.sessions(), 0);
        assert_eq!(engine.time_left_secs(), 60);
    }

    #[test]
    fn confirm_quit_abandons_then_resets() {
        let mut engine = TimerEngine::new(settings(1, 1, 1, 4));
        finish_phase(&mut engine);
        finish_phase(&mut engine);
        engine.start();
        engine.quit();

        let events = engine.confirm_quit();
        assert!(matches!(events[0], Event::SessionAbandoned { time_left_secs: 60, .. }));
        assert!(matches!(events[1], Event::TimerReset { .. }));
        assert_eq!(engine.sessions(), 0);
        assert!(!engine.is_running());
        assert!(!engine.awaiting_quit_confirmation());
    }

    #[test]
    fn confirm_quit_without_prompt_is_ignored() {
        let mut engine = TimerEngine::default();
        engine.start();
        engine.tick();
        engine.pause();
        assert!(engine.confirm_quit().is_empty());
        assert_eq!(engine.time_left_secs(), 1499);

        let mut engine = TimerEngine::new(settings(1, 5, 15, 4));
        finish_phase(&mut engine);
        engine.start();
        assert!(engine.confirm_quit().is_empty());
        assert_eq!(engine.phase(), Phase::Break);
        assert!(engine.is_running());
    }

    #[test]
    fn settings_change_waits_for_next_transition() {
        let mut engine = TimerEngine::new(settings(1, 5, 15, 4));
        engine.start();
        engine.tick();
        engine.set_settings(settings(10, 2, 15, 4));
        assert_eq!(engine.time_left_secs(), 59);
        assert_eq!(engine.total_secs(), 60);
        assert!(engine.progress() > 0.0);

        let events = engine.advance_by(59);
        assert!(matches!(
            events[0],
            Event::WorkSessionCompleted { focus_minutes: 10, .. }
        ));
        assert_eq!(engine.time_left_secs(), 120);
    }

    #[test]
    fn settings_change_resizes_an_untouched_phase() {
        let mut engine = TimerEngine::default();
        engine.set_settings(settings(1, 5, 15, 4));
        assert_eq!(engine.time_left_secs(), 60);
        assert_eq!(engine.total_secs(), 60);

        // A paused phase that already counted down keeps its length.
        engine.start();
        engine.tick();
        engine.pause();
        engine.set_settings(settings(50, 5, 15, 4));
        assert_eq!(engine.time_left_secs(), 59);
        assert_eq!(engine.total_secs(), 60);
    }

    #[test]
    fn repaired_fixes_inconsistent_saved_state() {
        let json = r#"{
            "settings": {"work_duration": 0, "break_duration": 5,
                         "long_break_duration": 15, "sessions_before_long_break": 4},
            "phase": "break", "is_running": false, "time_left_secs": 0,
            "sessions": 1, "awaiting_quit_confirmation": true
        }"#;
        let engine = serde_json::from_str::<TimerEngine>(json).unwrap().repaired();
        assert_eq!(engine.settings(), &Settings::default());
        assert_eq!(engine.phase(), Phase::Break);
        assert_eq!(engine.time_left_secs(), 300);
        assert_eq!(engine.total_secs(), 300);
        assert!(!engine.awaiting_quit_confirmation());

        // Saved before the phase length was recorded.
        let json = r#"{
            "settings": {"work_duration": 1, "break_duration": 5,
                         "long_break_duration": 15, "sessions_before_long_break": 4},
            "phase": "work", "is_running": true, "time_left_secs": 1400, "sessions": 0
        }"#;
        let engine = serde_json::from_str::<TimerEngine>(json).unwrap().repaired();
        assert_eq!(engine.time_left_secs(), 1400);
        assert_eq!(engine.total_secs(), 1400);
        assert_eq!(engine.progress(), 0.0);
    }

    #[test]
    fn advance_by_stops_at_phase_boundary() {
        let mut engine = TimerEngine::new(settings(1, 1, 1, 4));
        engine.start();
        engine.advance_by(500);
        assert_eq!(engine.phase(), Phase::Break);
        assert_eq!(engine.time_left_secs(), 60);
    }

    #[test]
    fn clock_formats_minutes_and_seconds() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(6000), "100:00");
    }

    #[test]
    fn engine_survives_serde_roundtrip_mid_session() {
        let mut engine = TimerEngine::default();
        engine.start();
        engine.advance_by(42);
        let json = serde_json::to_string(&engine).unwrap();
        let back: TimerEngine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, engine);
    }

    proptest! {
        #[test]
        fn work_and_break_alternate_below_threshold(
            work in 1u32..5,
            brk in 1u32..5,
            before_long in 2u32..8,
        ) {
            let mut engine = TimerEngine::new(settings(work, brk, 1, before_long));
            for n in 1..before_long {
                finish_phase(&mut engine);
                prop_assert_eq!(engine.phase(), Phase::Break);
                prop_assert_eq!(engine.sessions(), n);
                finish_phase(&mut engine);
                prop_assert_eq!(engine.phase(), Phase::Work);
            }
            finish_phase(&mut engine);
            prop_assert_eq!(engine.phase(), Phase::LongBreak);
            prop_assert_eq!(engine.sessions(), 0);
        }

        #[test]
        fn time_left_never_exceeds_phase_length(
            ops in proptest::collection::vec((0u8..7, 1u32..4), 0..200),
        ) {
            let mut engine = TimerEngine::new(settings(1, 1, 2, 2));
            for (op, minutes) in ops {
                match op {
                    0 => { engine.start(); }
                    1 => { engine.pause(); }
                    2 => { engine.quit(); }
                    3 => { engine.cancel_quit(); }
                    4 => { engine.confirm_quit(); }
                    5 => { engine.set_settings(settings(minutes, minutes, 2, 2)); }
                    _ => { engine.advance_by(17); }
                }
                prop_assert!(engine.time_left_secs() > 0);
                prop_assert!(engine.time_left_secs() <= engine.total_secs());
                prop_assert!((0.0..=1.0).contains(&engine.progress()));
                prop_assert!(engine.sessions() < 2);
            }
        }
    }
}
