use chrono::{Months, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Shift a date by whole calendar years (negative moves back).
///
/// Feb 29 lands on Feb 28 when the target year is not a leap year; every
/// other date keeps its month and day.
pub fn shift_years(date: NaiveDate, years: i32) -> Option<NaiveDate> {
    let months = Months::new(years.unsigned_abs().checked_mul(12)?);
    if years < 0 {
        date.checked_sub_months(months)
    } else {
        date.checked_add_months(months)
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::PeriodParse(format!("invalid date '{s}': {e}")))
}

/// Parse an IANA timezone name such as `America/New_York`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| Error::Config(format!("unknown timezone: {name}")))
}

/// The calendar date "now" in the given timezone.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// The most recent complete day in the given timezone. Search Console
/// data for the current day is partial, so it is never the default.
pub fn yesterday_in(tz: Tz) -> Result<NaiveDate> {
    day_before(today_in(tz))
}

pub fn day_before(date: NaiveDate) -> Result<NaiveDate> {
    date.pred_opt()
        .ok_or_else(|| Error::InvalidPeriod(format!("no day precedes {date}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_shift_years_plain() {
        assert_eq!(shift_years(d(2025, 3, 15), -1), Some(d(2024, 3, 15)));
        assert_eq!(shift_years(d(2025, 12, 31), -1), Some(d(2024, 12, 31)));
        assert_eq!(shift_years(d(2024, 1, 1), 1), Some(d(2025, 1, 1)));
    }

    #[test]
    fn test_shift_years_leap_day() {
        // Feb 29 has no counterpart in a non-leap year
        assert_eq!(shift_years(d(2024, 2, 29), -1), Some(d(2023, 2, 28)));
        assert_eq!(shift_years(d(2024, 2, 29), 1), Some(d(2025, 2, 28)));
        assert_eq!(shift_years(d(2024, 2, 29), -4), Some(d(2020, 2, 29)));
    }

    #[test]
    fn test_shift_years_is_not_365_days() {
        // A fixed 365-day shift would land on 2024-03-02 here
        assert_eq!(shift_years(d(2025, 3, 1), -1), Some(d(2024, 3, 1)));
    }

    #[test]
    fn test_shift_years_round_trip() {
        let mut date = d(2023, 1, 1);
        while date <= d(2023, 12, 31) {
            let back = shift_years(date, -1).unwrap();
            assert_eq!(shift_years(back, 1), Some(date));
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2025-01-31").unwrap(), d(2025, 1, 31));
        assert_eq!(parse_date(" 2025-01-31 ").unwrap(), d(2025, 1, 31));
        assert!(parse_date("2025-02-30").is_err());
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("UTC").unwrap(), Tz::UTC);
        assert_eq!(
            parse_timezone("America/New_York").unwrap(),
            Tz::America__New_York
        );
        assert!(parse_timezone("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn test_day_before() {
        assert_eq!(day_before(d(2025, 3, 1)).unwrap(), d(2025, 2, 28));
        assert_eq!(day_before(d(2024, 1, 1)).unwrap(), d(2023, 12, 31));
        assert!(matches!(day_before(NaiveDate::MIN), Err(Error::InvalidPeriod(_))));
    }
}
