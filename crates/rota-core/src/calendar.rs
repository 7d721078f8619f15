//! ISO-week calendar helpers.
//!
//! All week arithmetic in the core is Monday-anchored: a week is identified
//! by its Monday, and a Sunday normalizes to the Monday six days earlier.

use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::ParticipationPeriod;

/// Normalizes any date to the Monday of its ISO week.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn add_weeks(date: NaiveDate, n: i64) -> NaiveDate {
    date + Duration::days(7 * n)
}

/// ISO week identity as `(year, week)`. The ISO year can differ from the
/// calendar year near January 1st.
pub fn iso_week(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// Calendar days from `a` to `b`, negative when `b` precedes `a`.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Days of presence accumulated over `periods` up to (and excluding)
/// `up_to`: the sum of `min(end, up_to) - start` over intersecting periods.
pub fn days_present(periods: &[ParticipationPeriod], up_to: NaiveDate) -> i64 {
    periods
        .iter()
        .map(|period| {
            let end = period.end.map_or(up_to, |end| end.min(up_to));
            (end - period.start).num_days().max(0)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monday_of_is_identity_on_mondays() {
        let monday = date(2025, 1, 6);
        assert_eq!(monday_of(monday), monday);
    }

    #[test]
    fn test_monday_of_midweek() {
        // Thursday 2025-01-09 -> Monday 2025-01-06
        assert_eq!(monday_of(date(2025, 1, 9)), date(2025, 1, 6));
    }

    #[test]
    fn test_monday_of_sunday_goes_backwards() {
        // ISO weeks run Monday..Sunday, so Sunday belongs to the week that
        // started six days earlier.
        assert_eq!(monday_of(date(2025, 1, 12)), date(2025, 1, 6));
    }

    #[test]
    fn test_add_weeks() {
        assert_eq!(add_weeks(date(2025, 1, 6), 3), date(2025, 1, 27));
        assert_eq!(add_weeks(date(2025, 1, 6), -1), date(2024, 12, 30));
    }

    #[test]
    fn test_iso_week_year_boundary() {
        // 2024-12-30 is a Monday of ISO week 1 of 2025.
        assert_eq!(iso_week(date(2024, 12, 30)), (2025, 1));
        assert_eq!(iso_week(date(2025, 1, 6)), (2025, 2));
    }

    #[test]
    fn test_days_between_leap_year() {
        // 2024 is a leap year: Feb has 29 days.
        assert_eq!(days_between(date(2024, 2, 1), date(2024, 3, 1)), 29);
        assert_eq!(days_between(date(2025, 2, 1), date(2025, 3, 1)), 28);
        assert_eq!(days_between(date(2025, 3, 1), date(2025, 2, 1)), -28);
    }

    #[test]
    fn test_days_present_clamps_at_cutoff() {
        let periods = vec![
            ParticipationPeriod::new(date(2025, 1, 6), Some(date(2025, 1, 20))),
            ParticipationPeriod::new(date(2025, 2, 3), None),
        ];
        // First period contributes fully (14), open one is cut at up_to.
        assert_eq!(days_present(&periods, date(2025, 2, 10)), 14 + 7);
        // Cutoff inside the first period.
        assert_eq!(days_present(&periods, date(2025, 1, 13)), 7);
        // Cutoff before anything started.
        assert_eq!(days_present(&periods, date(2025, 1, 6)), 0);
    }
}
