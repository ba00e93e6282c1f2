// Reporting windows relative to "today"

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Search data settles a few days late, so every window ends this many
/// days before today.
pub const DATA_LAG_DAYS: i64 = 3;

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `days` days long, ending `ends_days_ago` days before `today`.
    pub fn ending(today: NaiveDate, ends_days_ago: i64, days: i64) -> Self {
        let end = today - Duration::days(ends_days_ago);
        Self {
            start: end - Duration::days(days - 1),
            end,
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Newest, middle and oldest 28-day windows for decay detection.
pub fn decay_windows(today: NaiveDate) -> [DateWindow; 3] {
    [
        DateWindow::ending(today, DATA_LAG_DAYS, 28),
        DateWindow::ending(today, DATA_LAG_DAYS + 28, 28),
        DateWindow::ending(today, DATA_LAG_DAYS + 56, 28),
    ]
}

/// Current and prior 30-day windows for position changes.
pub fn change_windows(today: NaiveDate) -> (DateWindow, DateWindow) {
    (
        DateWindow::ending(today, DATA_LAG_DAYS, 30),
        DateWindow::ending(today, DATA_LAG_DAYS + 30, 30),
    )
}

pub fn recent_window(today: NaiveDate, days: i64) -> DateWindow {
    DateWindow::ending(today, DATA_LAG_DAYS, days)
}
