//! One-second countdown driver.
//!
//! A `Countdown` holds at most one interval. Starting an active countdown is a
//! no-op, so a single engine can never receive two tick streams. Dropping or
//! stopping it clears the pending interval.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct Countdown {
    period: Duration,
    interval: Option<Interval>,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    pub fn new() -> Self {
        Self::with_period(TICK_PERIOD)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    /// Begin ticking. The first tick fires one period from now.
    /// Returns `false` if a countdown was already active.
    pub fn start(&mut self) -> bool {
        if self.interval.is_some() {
            return false;
        }
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        true
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Wait for the next tick. Never resolves while stopped, which makes it
    /// safe to use as a `select!` branch.
    pub async fn next_tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let mut countdown = Countdown::new();
        assert!(countdown.start());
        let begin = Instant::now();
        countdown.next_tick().await;
        countdown.next_tick().await;
        assert_eq!(begin.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let mut countdown = Countdown::new();
        assert!(countdown.start());
        assert!(!countdown.start());
        countdown.stop();
        assert!(!countdown.is_active());
        assert!(countdown.start());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_countdown_never_ticks() {
        let mut countdown = Countdown::new();
        let result =
            tokio::time::timeout(Duration::from_secs(10), countdown.next_tick()).await;
        assert!(result.is_err());
    }
}
