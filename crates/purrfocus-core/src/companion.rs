//! Focus companion.
//!
//! A virtual pet whose health follows focus discipline: completed work
//! sessions heal it, abandoned ones hurt it. A companion that dies freezes
//! the timer until a new one is adopted.

use serde::{Deserialize, Serialize};

pub const DEFAULT_COMPANION_NAME: &str = "Whiskers";
pub const MAX_HEALTH: u8 = 100;
/// Health restored by a completed work session.
pub const COMPLETION_BONUS: u8 = 10;
/// Health lost by abandoning a work session.
pub const ABANDON_PENALTY: u8 = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum CompanionEvent {
    SessionCompleted,
    Abandoned,
    Reset(String),
}

/// Display bucket for the companion's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Thriving,
    Okay,
    Weak,
    Gone,
}

impl Mood {
    pub fn description(&self) -> &'static str {
        match self {
            Mood::Thriving => "purring happily",
            Mood::Okay => "doing fine",
            Mood::Weak => "looking weak",
            Mood::Gone => "didn't make it",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionState {
    pub name: String,
    pub health: u8,
    pub is_alive: bool,
    pub focus_streak: u32,
}

impl Default for CompanionState {
    fn default() -> Self {
        Self::new(DEFAULT_COMPANION_NAME)
    }
}

impl CompanionState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health: MAX_HEALTH,
            is_alive: true,
            focus_streak: 0,
        }
    }

    pub fn apply(&mut self, event: CompanionEvent) {
        match event {
            CompanionEvent::SessionCompleted => {
                self.health = self.health.saturating_add(COMPLETION_BONUS).min(MAX_HEALTH);
                self.focus_streak = self.focus_streak.saturating_add(1);
            }
            CompanionEvent::Abandoned => {
                // Survival is judged on health before the penalty: exactly
                // ABANDON_PENALTY health is fatal.
                self.is_alive = self.health > ABANDON_PENALTY;
                self.health = self.health.saturating_sub(ABANDON_PENALTY);
                self.focus_streak = 0;
            }
            CompanionEvent::Reset(name) => {
                *self = Self::new(name);
            }
        }
    }

    /// Bring a companion restored from storage back within the reducer's
    /// bounds: health at most [`MAX_HEALTH`], no living companion at zero
    /// health, and a non-blank name.
    pub fn repaired(mut self) -> Self {
        if self.health > MAX_HEALTH {
            tracing::warn!(health = self.health, "restored companion health out of range");
            self.health = MAX_HEALTH;
        }
        if self.health == 0 {
            self.is_alive = false;
        }
        if self.name.trim().is_empty() {
            self.name = DEFAULT_COMPANION_NAME.to_string();
        }
        self
    }

    /// Reducer form of [`apply`](Self::apply).
    pub fn reduce(mut self, event: CompanionEvent) -> Self {
        self.apply(event);
        self
    }

    pub fn mood(&self) -> Mood {
        match self.health {
            _ if !self.is_alive => Mood::Gone,
            70.. => Mood::Thriving,
            40.. => Mood::Okay,
            1.. => Mood::Weak,
            0 => Mood::Gone,
        }
    }
}
