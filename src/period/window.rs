use chrono::{Days, NaiveDate};
use serde::Serialize;

use super::PeriodLength;
use crate::date_util::shift_years;
use crate::error::{Error, Result};

/// An inclusive date range analysed as one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PeriodWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidPeriod(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The window of `length` days whose last day is `end`.
    pub fn ending_at(end: NaiveDate, length: PeriodLength) -> Result<Self> {
        let start = end
            .checked_sub_days(Days::new(u64::from(length.days()) - 1))
            .ok_or_else(|| out_of_range(end, length))?;
        Ok(Self { start, end })
    }

    /// The window of equal length that ends the day before this one starts.
    pub fn preceding(&self) -> Result<Self> {
        let end = self
            .start
            .pred_opt()
            .ok_or_else(|| Error::InvalidPeriod(format!("no day precedes {}", self.start)))?;
        let length = PeriodLength::new(self.days())?;
        Self::ending_at(end, length)
    }

    /// This window with both endpoints moved by whole calendar years.
    pub fn shifted_years(&self, years: i32) -> Result<Self> {
        let shift = |d: NaiveDate| {
            shift_years(d, years).ok_or_else(|| {
                Error::InvalidPeriod(format!("cannot shift {d} by {years} years"))
            })
        };
        Self::new(shift(self.start)?, shift(self.end)?)
    }

    /// Number of days in the window, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn label(&self) -> String {
        format!("{} to {}", self.start, self.end)
    }
}

impl std::fmt::Display for PeriodWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

fn out_of_range(end: NaiveDate, length: PeriodLength) -> Error {
    Error::InvalidPeriod(format!(
        "a {}-day window ending {end} starts before the earliest supported date",
        length.days()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        assert!(PeriodWindow::new(d(2025, 1, 2), d(2025, 1, 1)).is_err());
        assert!(PeriodWindow::new(d(2025, 1, 1), d(2025, 1, 1)).is_ok());
    }

    #[test]
    fn test_ending_at() {
        let w = PeriodWindow::ending_at(d(2025, 3, 31), PeriodLength::new(30).unwrap()).unwrap();
        assert_eq!(w.start, d(2025, 3, 2));
        assert_eq!(w.end, d(2025, 3, 31));
        assert_eq!(w.days(), 30);
    }

    #[test]
    fn test_ending_at_single_day() {
        let w = PeriodWindow::ending_at(d(2025, 3, 31), PeriodLength::new(1).unwrap()).unwrap();
        assert_eq!(w.start, w.end);
        assert_eq!(w.days(), 1);
    }

    #[test]
    fn test_preceding_crosses_month_boundary() {
        let w = PeriodWindow::new(d(2025, 3, 1), d(2025, 3, 10)).unwrap();
        let prev = w.preceding().unwrap();
        assert_eq!(prev.end, d(2025, 2, 28));
        assert_eq!(prev.start, d(2025, 2, 19));
        assert_eq!(prev.days(), w.days());
    }

    #[test]
    fn test_shifted_years_leap() {
        let w = PeriodWindow::new(d(2024, 2, 20), d(2024, 2, 29)).unwrap();
        let back = w.shifted_years(-1).unwrap();
        assert_eq!(back.start, d(2023, 2, 20));
        assert_eq!(back.end, d(2023, 2, 28));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let w = PeriodWindow::new(d(2025, 1, 1), d(2025, 1, 3)).unwrap();
        assert!(w.contains(d(2025, 1, 1)));
        assert!(w.contains(d(2025, 1, 3)));
        assert!(!w.contains(d(2024, 12, 31)));
        assert!(!w.contains(d(2025, 1, 4)));
    }

    #[test]
    fn test_label() {
        let w = PeriodWindow::new(d(2025, 1, 1), d(2025, 1, 30)).unwrap();
        assert_eq!(w.label(), "2025-01-01 to 2025-01-30");
        assert_eq!(w.to_string(), w.label());
    }
}
