use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The current timer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    Break,
    LongBreak,
}

impl Phase {
    pub fn is_work(&self) -> bool {
        matches!(self, Phase::Work)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Work => "Focus Time",
            Phase::Break => "Break Time",
            Phase::LongBreak => "Long Break",
        }
    }
}

/// Pomodoro durations.
///
/// Durations are in minutes and must all be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub work_duration: u32,
    pub break_duration: u32,
    pub long_break_duration: u32,
    pub sessions_before_long_break: u32,
}

/// Partial settings update. `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub work_duration: Option<u32>,
    #[serde(default)]
    pub break_duration: Option<u32>,
    #[serde(default)]
    pub long_break_duration: Option<u32>,
    #[serde(default)]
    pub sessions_before_long_break: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            break_duration: 5,
            long_break_duration: 15,
            sessions_before_long_break: 4,
        }
    }
}

impl Settings {
    pub fn new(
        work_duration: u32,
        break_duration: u32,
        long_break_duration: u32,
        sessions_before_long_break: u32,
    ) -> Result<Self, ValidationError> {
        let settings = Self {
            work_duration,
            break_duration,
            long_break_duration,
            sessions_before_long_break,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("work_duration", self.work_duration),
            ("break_duration", self.break_duration),
            ("long_break_duration", self.long_break_duration),
            ("sessions_before_long_break", self.sessions_before_long_break),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    message: "must be a positive integer".into(),
                });
            }
        }
        Ok(())
    }

    /// Length of `phase` in seconds.
    pub fn duration_secs(&self, phase: Phase) -> u64 {
        let minutes = match phase {
            Phase::Work => self.work_duration,
            Phase::Break => self.break_duration,
            Phase::LongBreak => self.long_break_duration,
        };
        u64::from(minutes).saturating_mul(60)
    }

    /// Return a copy with `patch` applied, rejecting non-positive values.
    pub fn patched(&self, patch: &SettingsPatch) -> Result<Self, ValidationError> {
        let next = Self {
            work_duration: patch.work_duration.unwrap_or(self.work_duration),
            break_duration: patch.break_duration.unwrap_or(self.break_duration),
            long_break_duration: patch.long_break_duration.unwrap_or(self.long_break_duration),
            sessions_before_long_break: patch
                .sessions_before_long_break
                .unwrap_or(self.sessions_before_long_break),
        };
        next.validate()?;
        Ok(next)
    }
}
