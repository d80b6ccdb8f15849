//! Pure interval-schedule window expansion.
//!
//! A maintenance schedule is a month stride from a first due date. This
//! module computes which period dates of a schedule fall inside a requested
//! window; the repository layer materializes instances for them idempotently.

use chrono::{Datelike, NaiveDate};

use crate::models::{IntervalMonths, MaintenanceSchedule};
use crate::recurrence::add_months;

/// The schedule's period dates inside `[window_start, window_end]`, in
/// ascending order. The k-th period date is `first_due_date + k * interval`
/// months, with month addition clamping to month ends (a schedule first due
/// Jan 31 is due Feb 29, Mar 31, ...).
///
/// Restartable and side-effect free: overlapping windows simply re-yield the
/// overlapping dates.
pub fn occurrence_dates(
    first_due_date: NaiveDate,
    interval: IntervalMonths,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<NaiveDate> {
    if window_end < window_start || window_end < first_due_date {
        return Vec::new();
    }

    let step = interval.months();
    let mut k = starting_period(first_due_date, window_start, step);
    let mut dates = Vec::new();
    loop {
        let candidate = add_months(first_due_date, k * step);
        if candidate > window_end {
            break;
        }
        if candidate >= window_start {
            dates.push(candidate);
        }
        // Month addition saturates at the calendar limit; once it does,
        // later periods cannot advance past the window end.
        if candidate == NaiveDate::MAX {
            break;
        }
        k += 1;
    }
    dates
}

impl MaintenanceSchedule {
    pub fn occurrence_dates(&self, window_start: NaiveDate, window_end: NaiveDate) -> Vec<NaiveDate> {
        occurrence_dates(self.first_due_date, self.interval_months, window_start, window_end)
    }
}

/// First period index worth examining for a window. Backs up one period from
/// the whole-month estimate so day-of-month offsets cannot skip a date that
/// actually falls inside the window; the caller's `>= window_start` filter
/// drops the extras.
fn starting_period(first_due_date: NaiveDate, window_start: NaiveDate, step: u32) -> u32 {
    if window_start <= first_due_date {
        return 0;
    }
    let months = (window_start.year() - first_due_date.year()) * 12
        + window_start.month() as i32
        - first_due_date.month() as i32;
    let periods = months / step as i32 - 1;
    periods.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn quarterly_schedule_yields_single_date_in_month_window() {
        let dates = occurrence_dates(
            date(2024, 1, 15),
            IntervalMonths::Quarterly,
            date(2024, 7, 1),
            date(2024, 7, 31),
        );
        assert_eq!(dates, vec![date(2024, 7, 15)]);
    }

    #[test]
    fn window_containing_first_due_date_includes_it() {
        let dates = occurrence_dates(
            date(2024, 1, 15),
            IntervalMonths::Monthly,
            date(2024, 1, 1),
            date(2024, 3, 31),
        );
        assert_eq!(dates, vec![date(2024, 1, 15), date(2024, 2, 15), date(2024, 3, 15)]);
    }

    #[test]
    fn window_before_first_due_date_is_empty() {
        let dates = occurrence_dates(
            date(2024, 6, 1),
            IntervalMonths::Monthly,
            date(2024, 1, 1),
            date(2024, 5, 31),
        );
        assert!(dates.is_empty());
    }

    #[test]
    fn month_end_first_due_clamps_per_period() {
        let dates = occurrence_dates(
            date(2024, 1, 31),
            IntervalMonths::Monthly,
            date(2024, 2, 1),
            date(2024, 4, 30),
        );
        assert_eq!(dates, vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]);
    }

    #[test]
    fn annual_schedule_skips_years_without_periods() {
        // First due mid-2023; a 2024 window before the anniversary is empty.
        let dates = occurrence_dates(
            date(2023, 8, 10),
            IntervalMonths::Annual,
            date(2024, 1, 1),
            date(2024, 7, 31),
        );
        assert!(dates.is_empty());

        let dates = occurrence_dates(
            date(2023, 8, 10),
            IntervalMonths::Annual,
            date(2024, 8, 1),
            date(2024, 8, 31),
        );
        assert_eq!(dates, vec![date(2024, 8, 10)]);
    }

    #[test]
    fn window_start_on_period_date_keeps_it() {
        let dates = occurrence_dates(
            date(2024, 1, 15),
            IntervalMonths::SemiAnnual,
            date(2024, 7, 15),
            date(2025, 1, 15),
        );
        assert_eq!(dates, vec![date(2024, 7, 15), date(2025, 1, 15)]);
    }

    #[test]
    fn inverted_window_is_empty() {
        let dates = occurrence_dates(
            date(2024, 1, 15),
            IntervalMonths::Monthly,
            date(2024, 7, 31),
            date(2024, 7, 1),
        );
        assert!(dates.is_empty());
    }

    #[test]
    fn window_reaching_calendar_limit_terminates() {
        // Month addition saturates at the calendar limit; the expansion must
        // still finish instead of yielding the limit date forever.
        let dates = occurrence_dates(
            date(2024, 1, 15),
            IntervalMonths::Annual,
            NaiveDate::MAX,
            NaiveDate::MAX,
        );
        assert!(dates.len() <= 1);
    }

    #[test]
    fn expansion_is_deterministic_for_repeated_windows() {
        let run = || {
            occurrence_dates(
                date(2024, 1, 15),
                IntervalMonths::Bimonthly,
                date(2024, 3, 1),
                date(2024, 9, 30),
            )
        };
        assert_eq!(run(), run());
        assert_eq!(run(), vec![date(2024, 3, 15), date(2024, 5, 15), date(2024, 7, 15), date(2024, 9, 15)]);
    }
}
