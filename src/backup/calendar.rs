//! Calendar dates with whole-day arithmetic.
//!
//! `Date` is a plain (year, month, day) triple. Ordering is calendar order and
//! subtracting two dates yields the signed number of days between them.

use crate::backup::result_error::error::{Error, InvalidDateReason};
use crate::backup::result_error::result::Result;
use chrono::{Datelike, Local, NaiveDate};
use getset::CopyGetters;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Display, Formatter};
use std::ops::Sub;
use std::str::FromStr;

/// Environment variable that replaces the current date, in `YYYY-MM-DD` form
pub static TODAY_OVERRIDE_ENV: &str = "BACKUP_TODAY";

/// Day number of the first day of each month in a non-leap year, indexed 1..=12.
/// Index 13 closes December so month lengths can be taken as differences.
static MONTH_START: [i32; 14] = [
    0,
    0,
    31,
    31 + 28,
    31 + 28 + 31,
    31 + 28 + 31 + 30,
    31 + 28 + 31 + 30 + 31,
    31 + 28 + 31 + 30 + 31 + 30,
    31 + 28 + 31 + 30 + 31 + 30 + 31,
    31 + 28 + 31 + 30 + 31 + 30 + 31 + 31,
    31 + 28 + 31 + 30 + 31 + 30 + 31 + 31 + 30,
    31 + 28 + 31 + 30 + 31 + 30 + 31 + 31 + 30 + 31,
    31 + 28 + 31 + 30 + 31 + 30 + 31 + 31 + 30 + 31 + 30,
    31 + 28 + 31 + 30 + 31 + 30 + 31 + 31 + 30 + 31 + 30 + 31,
];

/// A calendar date.
///
/// Field order matters: the derived `Ord` compares year, then month, then day.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    CopyGetters,
    SerializeDisplay,
    DeserializeFromStr,
)]
#[getset(get_copy = "pub")]
pub struct Date {
    year: i32,
    month: i32,
    day: i32,
}

impl Date {
    /// Builds a date from its parts, applying the same checks as parsing.
    pub fn new(year: i32, month: i32, day: i32) -> Result<Date> {
        let input = || format!("{year:04}-{month:02}-{day:02}");
        if year < 1 {
            return Err(Error::invalid_date(input(), InvalidDateReason::YearTooSmall));
        }
        if !(1..=12).contains(&month) {
            return Err(Error::invalid_date(input(), InvalidDateReason::MonthOutOfRange));
        }
        if day < 1 || Self::month_length(year, month).map_or(true, |len| day > len) {
            return Err(Error::invalid_date(input(), InvalidDateReason::DayOutOfRange));
        }
        Ok(Date { year, month, day })
    }

    /// The current local date, or the value of [`TODAY_OVERRIDE_ENV`] when set.
    pub fn today() -> Result<Date> {
        match std::env::var(TODAY_OVERRIDE_ENV) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Local::now().date_naive().into()),
        }
    }

    pub fn is_leap_year(year: i32) -> bool {
        (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
    }

    /// Number of days in `month` of `year`, `None` unless `month` is in 1..=12.
    pub fn month_length(year: i32, month: i32) -> Option<i32> {
        if !(1..=12).contains(&month) {
            return None;
        }
        let m = month as usize;
        let len = MONTH_START[m + 1] - MONTH_START[m];
        if month == 2 && Self::is_leap_year(year) {
            Some(len + 1)
        } else {
            Some(len)
        }
    }

    /// Monotonic day number; consecutive days differ by exactly one.
    /// Computed in `i64` so that every representable year fits.
    pub fn to_number(&self) -> i64 {
        let y = i64::from(self.year);
        let prior = y - 1;
        let mut dayno = 365 * y + prior / 4 - prior / 100 + prior / 400;
        dayno += i64::from(MONTH_START[self.month as usize]);
        if self.month > 2 && Self::is_leap_year(self.year) {
            dayno += 1;
        }
        dayno + i64::from(self.day) - 1
    }

    /// Advances to the same day of the next month.
    ///
    /// The day is carried over as is; callers that need a valid month
    /// boundary should start from [`Date::first_of_month`].
    pub fn add_month(&mut self) {
        self.month += 1;
        if self.month > 12 {
            self.month = 1;
            self.year += 1;
        }
    }

    pub fn first_of_month(&self) -> Date {
        Date { day: 1, ..*self }
    }
}

impl FromStr for Date {
    type Err = Error;

    fn from_str(s: &str) -> Result<Date> {
        let bad_format = || Error::invalid_date(s, InvalidDateReason::BadFormat);
        let mut fields = s.split('-').map(|f| {
            if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad_format());
            }
            f.parse::<i32>().map_err(|_| bad_format())
        });
        let (Some(year), Some(month), Some(day), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(bad_format());
        };
        Date::new(year?, month?, day?).map_err(|e| match e {
            Error::InvalidDate { reason, .. } => Error::invalid_date(s, reason),
            e => e,
        })
    }
}

impl Display for Date {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl Sub for Date {
    type Output = i64;

    fn sub(self, rhs: Date) -> i64 {
        self.to_number() - rhs.to_number()
    }
}

impl From<NaiveDate> for Date {
    fn from(value: NaiveDate) -> Self {
        Date {
            year: value.year(),
            month: value.month() as i32,
            day: value.day() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn reason(s: &str) -> InvalidDateReason {
        match s.parse::<Date>() {
            Err(Error::InvalidDate { input, reason }) => {
                assert_eq!(input, s);
                reason
            }
            other => panic!("Expected InvalidDate for {s:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_and_format() {
        let d = date("2024-03-07");
        assert_eq!((d.year(), d.month(), d.day()), (2024, 3, 7));
        assert_eq!(d.to_string(), "2024-03-07");
        assert_eq!(date("2024-3-7"), d);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(reason(""), InvalidDateReason::BadFormat);
        assert_eq!(reason("2024-03"), InvalidDateReason::BadFormat);
        assert_eq!(reason("2024-03-07-01"), InvalidDateReason::BadFormat);
        assert_eq!(reason("2024/03/07"), InvalidDateReason::BadFormat);
        assert_eq!(reason("20x4-03-07"), InvalidDateReason::BadFormat);
        assert_eq!(reason("0000-01-01"), InvalidDateReason::YearTooSmall);
        assert_eq!(reason("2024-13-01"), InvalidDateReason::MonthOutOfRange);
        assert_eq!(reason("2024-00-01"), InvalidDateReason::MonthOutOfRange);
        assert_eq!(reason("2024-04-31"), InvalidDateReason::DayOutOfRange);
        assert_eq!(reason("2024-04-00"), InvalidDateReason::DayOutOfRange);
    }

    #[test]
    fn test_leap_years() {
        assert!(date("2024-02-29").day() == 29);
        assert_eq!(reason("2023-02-29"), InvalidDateReason::DayOutOfRange);
        assert_eq!(reason("1900-02-29"), InvalidDateReason::DayOutOfRange);
        assert!(Date::new(2000, 2, 29).is_ok());
        assert_eq!(Date::month_length(2024, 2), Some(29));
        assert_eq!(Date::month_length(2023, 2), Some(28));
        assert_eq!(Date::month_length(2023, 12), Some(31));
    }

    #[test]
    fn test_month_length_out_of_range() {
        assert_eq!(Date::month_length(2024, 0), None);
        assert_eq!(Date::month_length(2024, 13), None);
        assert_eq!(Date::month_length(2024, -1), None);
    }

    #[test]
    fn test_subtraction() {
        assert_eq!(date("2024-03-01") - date("2024-02-28"), 2);
        assert_eq!(date("2023-03-01") - date("2023-02-28"), 1);
        assert_eq!(date("2025-01-01") - date("2024-01-01"), 366);
        assert_eq!(date("2024-01-01") - date("2025-01-01"), -366);
        let d = date("1999-12-31");
        assert_eq!(d - d, 0);
    }

    #[test]
    fn test_to_number_increases_by_one_per_day() {
        for years in [1899..=1901, 1999..=2001, 2023..=2025] {
            let mut previous: Option<Date> = None;
            for year in years {
                for month in 1..=12 {
                    for day in 1..=Date::month_length(year, month).unwrap() {
                        let d = Date::new(year, month, day).unwrap();
                        assert_eq!(d.to_string().parse::<Date>().unwrap(), d);
                        if let Some(p) = previous {
                            assert_eq!(d.to_number() - p.to_number(), 1, "{p} -> {d}");
                            assert!(p < d);
                        }
                        previous = Some(d);
                    }
                }
            }
        }
    }

    #[test]
    fn test_subtraction_with_huge_years() {
        let far = date("9000000-01-01");
        let now = date("2024-01-01");
        assert!(far - now > 0);
        assert_eq!(far - now, -(now - far));
        assert_eq!(date("9000000-01-02") - far, 1);

        let last = Date::new(i32::MAX, 12, 31).unwrap();
        assert!(last - date("0001-01-01") > 0);
        assert_eq!(last - Date::new(i32::MAX, 12, 30).unwrap(), 1);
    }

    #[test]
    fn test_ordering_matches_day_number() {
        let dates = ["2023-12-31", "2024-01-01", "2024-02-29", "2024-03-01", "2100-02-28"]
            .map(date);
        for pair in dates.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[1] - pair[0] > 0);
        }
    }

    #[test]
    fn test_add_month() {
        let mut d = date("2023-11-15");
        d.add_month();
        assert_eq!(d, date("2023-12-15"));
        d.add_month();
        assert_eq!(d, date("2024-01-15"));

        let mut d = date("2024-01-31").first_of_month();
        d.add_month();
        assert_eq!(d, date("2024-02-01"));
    }

    #[test]
    fn test_from_naive_date() {
        let nd = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Date::from(nd), date("2024-02-29"));
    }

    #[test]
    fn test_serde_as_string() {
        let d = date("2024-02-29");
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"2024-02-29\"");
        let back: Date = serde_json::from_str("\"2024-02-29\"").unwrap();
        assert_eq!(back, d);
        assert!(serde_json::from_str::<Date>("\"2023-02-29\"").is_err());
    }
}
