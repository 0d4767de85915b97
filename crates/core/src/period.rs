use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One calendar month of reconciliation scope. Only [`ReportingPeriod::new`]
/// and [`ReportingPeriod::containing`] construct it, so the month is always
/// valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    year: i32,
    month: u32,
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl ReportingPeriod {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        // Validate through chrono rather than a range check.
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(ReportingPeriod { year, month })
    }

    /// The period containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        ReportingPeriod {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            ReportingPeriod {
                year: self.year - 1,
                month: 12,
            }
        } else {
            ReportingPeriod {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn start_date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }

    /// Last day of the month (inclusive end, matching DateRange::contains).
    pub fn end_date(self) -> NaiveDate {
        let next = self.next();
        next.start_date().pred_opt().unwrap()
    }

    pub fn date_range(self) -> DateRange {
        DateRange::new(self.start_date(), self.end_date())
    }

    fn next(self) -> Self {
        if self.month == 12 {
            ReportingPeriod {
                year: self.year + 1,
                month: 1,
            }
        } else {
            ReportingPeriod {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    /// The window `days` on either side of `center`, inclusive.
    pub fn around(center: NaiveDate, days: i64) -> Self {
        DateRange {
            start: center - Duration::days(days),
            end: center + Duration::days(days),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_display() {
        assert_eq!(ReportingPeriod::new(2024, 3).unwrap().to_string(), "2024-03");
    }

    #[test]
    fn period_new_rejects_invalid_month() {
        assert!(ReportingPeriod::new(2024, 0).is_none());
        assert!(ReportingPeriod::new(2024, 13).is_none());
    }

    #[test]
    fn period_range_covers_whole_month() {
        let range = ReportingPeriod::new(2024, 2).unwrap().date_range();
        assert_eq!(range.start, date(2024, 2, 1));
        assert_eq!(range.end, date(2024, 2, 29)); // leap year
    }

    #[test]
    fn period_range_for_december() {
        let range = ReportingPeriod::new(2023, 12).unwrap().date_range();
        assert_eq!(range.end, date(2023, 12, 31));
    }

    #[test]
    fn previous_rolls_over_january() {
        let period = ReportingPeriod::new(2024, 1).unwrap();
        assert_eq!(period.previous(), ReportingPeriod::new(2023, 12).unwrap());
    }

    #[test]
    fn containing_picks_the_month_of_the_date() {
        let period = ReportingPeriod::containing(date(2024, 3, 10));
        assert_eq!(period, ReportingPeriod::new(2024, 3).unwrap());
    }

    #[test]
    fn date_range_contains_is_inclusive() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 12, 31));
        assert!(range.contains(date(2024, 6, 15)));
        assert!(range.contains(date(2024, 1, 1))); // inclusive start
        assert!(range.contains(date(2024, 12, 31))); // inclusive end
        assert!(!range.contains(date(2023, 12, 31)));
        assert!(!range.contains(date(2025, 1, 1)));
    }

    #[test]
    fn around_pads_both_sides() {
        let range = DateRange::around(date(2024, 3, 10), 4);
        assert_eq!(range.start, date(2024, 3, 6));
        assert_eq!(range.end, date(2024, 3, 14));
        assert!(range.contains(date(2024, 3, 6)));
        assert!(!range.contains(date(2024, 3, 5)));
    }

    #[test]
    fn date_range_display() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 12, 31));
        assert_eq!(range.to_string(), "2024-01-01 to 2024-12-31");
    }
}
