//! Habit log and dashboard statistics.
//!
//! Every completed work session appends one [`HabitLogEntry`]; entries for
//! the same day are never merged on write. The read side folds them by day.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Daily focus minutes that fill a dashboard bar.
pub const DAILY_TARGET_MIN: u32 = 120;
/// Length of the dashboard window, ending today.
pub const WEEK_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitLogEntry {
    pub date: NaiveDate,
    pub focus_minutes: u32,
    pub completed_sessions: u32,
}

impl HabitLogEntry {
    /// Entry for one completed work session.
    pub fn for_session(date: NaiveDate, focus_minutes: u32) -> Self {
        Self {
            date,
            focus_minutes,
            completed_sessions: 1,
        }
    }
}

/// Totals for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyFocus {
    pub date: NaiveDate,
    pub focus_minutes: u32,
    pub completed_sessions: u32,
}

impl DailyFocus {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            focus_minutes: 0,
            completed_sessions: 0,
        }
    }

    /// Share of [`DAILY_TARGET_MIN`] reached, capped at 1.0.
    pub fn fill_ratio(&self) -> f64 {
        (f64::from(self.focus_minutes) / f64::from(DAILY_TARGET_MIN)).min(1.0)
    }
}

/// Sum same-day entries.
pub fn fold_by_day<'a, I>(entries: I) -> BTreeMap<NaiveDate, DailyFocus>
where
    I: IntoIterator<Item = &'a HabitLogEntry>,
{
    entries
        .into_iter()
        .fold(BTreeMap::new(), |mut days, entry| {
            let day = days
                .entry(entry.date)
                .or_insert_with(|| DailyFocus::empty(entry.date));
            day.focus_minutes = day.focus_minutes.saturating_add(entry.focus_minutes);
            day.completed_sessions = day
                .completed_sessions
                .saturating_add(entry.completed_sessions);
            days
        })
}

/// Dashboard view: today's totals and the seven days ending today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitSummary {
    pub today: DailyFocus,
    /// Oldest first, `today` last.
    pub last_7_days: Vec<DailyFocus>,
    /// Mean daily focus minutes over `last_7_days`, rounded.
    pub weekly_average_min: u32,
}

impl HabitSummary {
    pub fn build(entries: &[HabitLogEntry], today: NaiveDate) -> Self {
        let days = fold_by_day(entries);
        let last_7_days: Vec<DailyFocus> = (0..WEEK_DAYS)
            .rev()
            .map(|offset| {
                let date = today.checked_sub_days(Days::new(offset)).unwrap_or(today);
                days.get(&date)
                    .copied()
                    .unwrap_or_else(|| DailyFocus::empty(date))
            })
            .collect();

        let total: u64 = last_7_days
            .iter()
            .map(|d| u64::from(d.focus_minutes))
            .sum();
        let weekly_average_min = (total as f64 / WEEK_DAYS as f64).round() as u32;

        Self {
            today: days
                .get(&today)
                .copied()
                .unwrap_or_else(|| DailyFocus::empty(today)),
            last_7_days,
            weekly_average_min,
        }
    }
}
