mod countdown;
mod engine;
mod settings;

pub use countdown::{Countdown, TICK_PERIOD};
pub use engine::{format_clock, TimerEngine};
pub use settings::{Phase, Settings, SettingsPatch};
