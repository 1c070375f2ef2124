mod window;

pub use window::PeriodWindow;

use std::sync::LazyLock;

use chrono::{Days, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::date_util::shift_years;
use crate::error::{Error, Result};

static RE_ROLLING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)d$").unwrap());
static RE_YOY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)d-yoy$").unwrap());
static RE_MULTI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)x(\d+)d$").unwrap());

/// Period lengths offered by the dashboard's period picker.
pub const PRESET_LENGTHS: [u32; 5] = [30, 60, 90, 180, 360];

/// Upper bound on the number of windows in a multi-period spec.
pub const MAX_PERIODS: u32 = 1000;

/// Length of a period in days. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PeriodLength(u32);

impl PeriodLength {
    pub fn new(days: i64) -> Result<Self> {
        if days <= 0 {
            return Err(Error::InvalidPeriod(format!(
                "period length must be a positive number of days, got {days}"
            )));
        }
        u32::try_from(days)
            .map(Self)
            .map_err(|_| Error::InvalidPeriod(format!("period length {days} is too large")))
    }

    pub fn days(self) -> u32 {
        self.0
    }

    pub fn is_preset(self) -> bool {
        PRESET_LENGTHS.contains(&self.0)
    }
}

/// How the baseline (or historical) windows relate to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Compare against the immediately preceding window of equal length.
    Rolling,
    /// Compare against the same calendar window one year earlier.
    YearOverYear,
    /// `periods` adjacent windows of equal length, most recent first.
    MultiConsecutive { periods: u32 },
}

/// A validated request for a set of period windows.
///
/// Construction computes the windows, so a `PeriodSpec` that exists is
/// always one whose windows are representable. The reference date is the
/// last day of the current window and must be strictly before `today`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSpec {
    length: PeriodLength,
    mode: ComparisonMode,
    reference_date: NaiveDate,
    windows: Vec<PeriodWindow>,
}

impl PeriodSpec {
    pub fn new(
        length: PeriodLength,
        mode: ComparisonMode,
        reference_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Self> {
        if reference_date >= today {
            return Err(Error::InvalidPeriod(format!(
                "reference date {reference_date} must be before {today}; the current day is incomplete"
            )));
        }

        let current = PeriodWindow::ending_at(reference_date, length)?;
        let windows = match mode {
            ComparisonMode::Rolling => vec![current, current.preceding()?],
            ComparisonMode::YearOverYear => vec![current, current.shifted_years(-1)?],
            ComparisonMode::MultiConsecutive { periods: 0 } => {
                return Err(Error::InvalidPeriod(
                    "period count must be at least 1".into(),
                ));
            }
            ComparisonMode::MultiConsecutive { periods } if periods > MAX_PERIODS => {
                return Err(Error::InvalidPeriod(format!(
                    "at most {MAX_PERIODS} periods are supported, got {periods}"
                )));
            }
            ComparisonMode::MultiConsecutive { periods } => {
                // Every window has to start on a representable date
                let total_days = u64::from(periods) * u64::from(length.days());
                if reference_date.checked_sub_days(Days::new(total_days - 1)).is_none() {
                    return Err(Error::InvalidPeriod(format!(
                        "{periods} windows of {} days ending {reference_date} start before the earliest supported date",
                        length.days()
                    )));
                }
                let mut windows = vec![current];
                for _ in 1..periods {
                    let last = windows[windows.len() - 1];
                    windows.push(last.preceding()?);
                }
                windows
            }
        };

        log::debug!(
            "period {} ending {reference_date}: {}",
            key_for(length, mode),
            windows
                .iter()
                .map(PeriodWindow::label)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            length,
            mode,
            reference_date,
            windows,
        })
    }

    /// Parse a period shorthand.
    ///
    /// Supported formats:
    /// - `30d`: rolling 30 days vs the preceding 30 days
    /// - `30d-yoy`: the last 30 days vs the same dates a year earlier
    /// - `4x90d`: four consecutive 90-day windows
    /// - `yoy`: the trailing calendar year vs the year before it
    pub fn parse(s: &str, reference_date: NaiveDate, today: NaiveDate) -> Result<Self> {
        let s = s.trim().to_lowercase();

        if s == "yoy" {
            let year_ago = shift_years(reference_date, -1).ok_or_else(|| {
                Error::InvalidPeriod(format!("no year precedes {reference_date}"))
            })?;
            let length = PeriodLength::new((reference_date - year_ago).num_days())?;
            return Self::new(length, ComparisonMode::YearOverYear, reference_date, today);
        }

        if let Some(caps) = RE_ROLLING.captures(&s) {
            let length = parse_length(&caps[1])?;
            return Self::new(length, ComparisonMode::Rolling, reference_date, today);
        }

        if let Some(caps) = RE_YOY.captures(&s) {
            let length = parse_length(&caps[1])?;
            return Self::new(length, ComparisonMode::YearOverYear, reference_date, today);
        }

        if let Some(caps) = RE_MULTI.captures(&s) {
            let periods: u32 = caps[1]
                .parse()
                .map_err(|_| Error::PeriodParse(format!("invalid period count: {s}")))?;
            let length = parse_length(&caps[2])?;
            return Self::new(
                length,
                ComparisonMode::MultiConsecutive { periods },
                reference_date,
                today,
            );
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    pub fn length(&self) -> PeriodLength {
        self.length
    }

    pub fn mode(&self) -> ComparisonMode {
        self.mode
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// The current window first, then the baseline or older windows.
    pub fn windows(&self) -> &[PeriodWindow] {
        &self.windows
    }

    pub fn current_window(&self) -> PeriodWindow {
        self.windows[0]
    }

    /// Smallest window covering every window of this spec.
    pub fn span(&self) -> PeriodWindow {
        let start = self.windows.iter().map(|w| w.start).min();
        let end = self.windows.iter().map(|w| w.end).max();
        match (start, end) {
            (Some(start), Some(end)) => PeriodWindow { start, end },
            _ => self.current_window(),
        }
    }

    /// Display role of `windows()[index]`: `current`, `baseline`, or the
    /// offset (`-1`, `-2`, ...) of an older window in a multi-period spec.
    pub fn window_role(&self, index: usize) -> String {
        match (index, self.mode) {
            (0, _) => "current".to_string(),
            (i, ComparisonMode::MultiConsecutive { .. }) => format!("-{i}"),
            _ => "baseline".to_string(),
        }
    }

    /// Canonical shorthand, the inverse of [`PeriodSpec::parse`].
    pub fn key(&self) -> String {
        key_for(self.length, self.mode)
    }
}

impl std::fmt::Display for PeriodSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ending {}", self.key(), self.reference_date)
    }
}

fn key_for(length: PeriodLength, mode: ComparisonMode) -> String {
    let n = length.days();
    match mode {
        ComparisonMode::Rolling => format!("{n}d"),
        ComparisonMode::YearOverYear => format!("{n}d-yoy"),
        ComparisonMode::MultiConsecutive { periods } => format!("{periods}x{n}d"),
    }
}

fn parse_length(digits: &str) -> Result<PeriodLength> {
    let days: i64 = digits
        .parse()
        .map_err(|_| Error::PeriodParse(format!("invalid day count: {digits}")))?;
    PeriodLength::new(days)
}
