//! Pure recurrence date math.
//!
//! [`next_occurrence`] is total: for any pattern and anchor it returns a date
//! strictly after the anchor and never fails. Fields a frequency needs but
//! the rule leaves unset fall back to the anchor's own day-of-month, weekday
//! or month. Callers that cannot accept a best-effort date (the advancing
//! engine) run [`validate`] first.

use chrono::{Datelike, Duration, Months, NaiveDate};

use crate::error::CoreError;
use crate::models::{RecurrencePattern, RecurrenceRule};

/// Computes the next occurrence strictly after `anchor`.
///
/// End-date filtering is the caller's job; this function only does calendar
/// arithmetic.
pub fn next_occurrence(pattern: &RecurrencePattern, anchor: NaiveDate) -> NaiveDate {
    match pattern {
        RecurrencePattern::Daily { interval } => {
            anchor + Duration::days(effective_interval(*interval))
        }
        RecurrencePattern::Weekly { interval, days_of_week } => {
            let interval = effective_interval(*interval);
            if days_of_week.is_empty() {
                // Same weekday as the anchor, one interval of weeks out.
                return anchor + Duration::weeks(interval);
            }

            // Walk the remainder of the anchor's week (weeks run Sunday
            // through Saturday) looking for a matching weekday.
            let anchor_dow = anchor.weekday().num_days_from_sunday();
            for offset in 1..=(6 - anchor_dow) as i64 {
                let candidate = anchor + Duration::days(offset);
                if matches_weekday(days_of_week, candidate) {
                    return candidate;
                }
            }

            // Nothing left this week: jump to the first matching weekday in
            // the week `interval` weeks after the anchor's.
            let week_start = anchor - Duration::days(anchor_dow as i64);
            let next_week = week_start + Duration::weeks(interval);
            for offset in 0..7 {
                let candidate = next_week + Duration::days(offset);
                if matches_weekday(days_of_week, candidate) {
                    return candidate;
                }
            }

            // The set held no valid weekday at all; behave like the empty set.
            anchor + Duration::weeks(interval)
        }
        RecurrencePattern::Monthly { interval, day_of_month } => {
            let target = add_months(anchor, effective_interval(*interval) as u32);
            clamped_date(
                target.year(),
                target.month(),
                day_of_month.unwrap_or_else(|| anchor.day()),
            )
        }
        RecurrencePattern::Yearly { interval, day_of_month, month } => {
            let year = anchor.year() + effective_interval(*interval) as i32;
            let month = month.unwrap_or_else(|| anchor.month()).clamp(1, 12);
            clamped_date(year, month, day_of_month.unwrap_or_else(|| anchor.day()))
        }
    }
}

/// Checks a pattern for values that cannot be tolerantly defaulted. The pure
/// math above accepts anything; the advancing engine refuses to run a series
/// off a rule that is outright misconfigured.
pub fn validate(pattern: &RecurrencePattern) -> Result<(), CoreError> {
    if pattern.interval() == 0 {
        return Err(CoreError::InvalidRule("interval must be at least 1".to_string()));
    }
    match pattern {
        RecurrencePattern::Daily { .. } => {}
        RecurrencePattern::Weekly { days_of_week, .. } => {
            if let Some(day) = days_of_week.iter().find(|d| **d > 6) {
                return Err(CoreError::InvalidRule(format!(
                    "day of week {day} is out of range 0..=6"
                )));
            }
        }
        RecurrencePattern::Monthly { day_of_month, .. } => {
            validate_day_of_month(*day_of_month)?;
        }
        RecurrencePattern::Yearly { day_of_month, month, .. } => {
            validate_day_of_month(*day_of_month)?;
            if let Some(month) = month {
                if !(1..=12).contains(month) {
                    return Err(CoreError::InvalidRule(format!(
                        "month {month} is out of range 1..=12"
                    )));
                }
            }
        }
    }
    Ok(())
}

impl RecurrenceRule {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate(&self.pattern)
    }

    /// The next due date after `anchor`, or `None` when the series' end date
    /// cuts it off. A `None` is a normal end-of-series, not an error.
    pub fn due_after(&self, anchor: NaiveDate) -> Option<NaiveDate> {
        let next = next_occurrence(&self.pattern, anchor);
        match self.end_date {
            Some(end) if next > end => None,
            _ => Some(next),
        }
    }
}

fn validate_day_of_month(day_of_month: Option<u32>) -> Result<(), CoreError> {
    if let Some(day) = day_of_month {
        if !(1..=31).contains(&day) {
            return Err(CoreError::InvalidRule(format!(
                "day of month {day} is out of range 1..=31"
            )));
        }
    }
    Ok(())
}

fn effective_interval(interval: u32) -> i64 {
    interval.max(1) as i64
}

fn matches_weekday(days: &std::collections::BTreeSet<u8>, date: NaiveDate) -> bool {
    days.contains(&(date.weekday().num_days_from_sunday() as u8))
}

/// Month addition with chrono's end-of-month clamping (Jan 31 + 1 month is
/// Feb 29 in a leap year). Saturates at the calendar limit rather than
/// failing; the limit is far outside any realistic schedule.
pub(crate) fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(NaiveDate::MAX)
}

/// A concrete date with the day clamped into the month's valid range.
fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MAX)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    (28..=31)
        .rev()
        .find(|day| NaiveDate::from_ymd_opt(year, month, *day).is_some())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekdays<const N: usize>(days: [u8; N]) -> BTreeSet<u8> {
        days.into_iter().collect()
    }

    #[test]
    fn daily_adds_interval_days() {
        let pattern = RecurrencePattern::Daily { interval: 1 };
        assert_eq!(next_occurrence(&pattern, date(2024, 3, 4)), date(2024, 3, 5));

        let pattern = RecurrencePattern::Daily { interval: 10 };
        assert_eq!(next_occurrence(&pattern, date(2024, 2, 25)), date(2024, 3, 6));
    }

    #[test]
    fn weekly_without_day_set_keeps_anchor_weekday() {
        let pattern = RecurrencePattern::Weekly { interval: 2, days_of_week: BTreeSet::new() };
        // Monday anchor, two weeks later is still a Monday.
        assert_eq!(next_occurrence(&pattern, date(2024, 3, 4)), date(2024, 3, 18));
    }

    #[test]
    fn weekly_day_set_picks_next_day_in_same_week() {
        // Monday 2024-03-04 with {Mon, Thu}: Thursday of the same week.
        let pattern = RecurrencePattern::Weekly { interval: 1, days_of_week: weekdays([1, 4]) };
        assert_eq!(next_occurrence(&pattern, date(2024, 3, 4)), date(2024, 3, 7));
    }

    #[test]
    fn weekly_day_set_wraps_to_next_interval_week() {
        // Wednesday 2024-03-06 with {Mon, Wed}: nothing left this week, so
        // the following Monday.
        let pattern = RecurrencePattern::Weekly { interval: 1, days_of_week: weekdays([1, 3]) };
        assert_eq!(next_occurrence(&pattern, date(2024, 3, 6)), date(2024, 3, 11));
    }

    #[test]
    fn weekly_wrap_respects_interval_multiplier() {
        // Saturday anchor with {Tue} and interval 3 lands in the week three
        // weeks out.
        let pattern = RecurrencePattern::Weekly { interval: 3, days_of_week: weekdays([2]) };
        assert_eq!(next_occurrence(&pattern, date(2024, 3, 9)), date(2024, 3, 26));
    }

    #[test]
    fn weekly_day_set_with_only_invalid_days_falls_back() {
        let pattern = RecurrencePattern::Weekly { interval: 1, days_of_week: weekdays([9]) };
        assert_eq!(next_occurrence(&pattern, date(2024, 3, 4)), date(2024, 3, 11));
    }

    #[test]
    fn monthly_clamps_to_end_of_shorter_month() {
        let pattern = RecurrencePattern::Monthly { interval: 1, day_of_month: Some(31) };
        assert_eq!(next_occurrence(&pattern, date(2024, 1, 31)), date(2024, 2, 29));
        assert_eq!(next_occurrence(&pattern, date(2023, 1, 31)), date(2023, 2, 28));
        assert_eq!(next_occurrence(&pattern, date(2024, 3, 31)), date(2024, 4, 30));
    }

    #[test]
    fn monthly_recovers_day_after_clamped_month() {
        // Clamping is per occurrence: the 31st reappears once a long month
        // comes back around.
        let pattern = RecurrencePattern::Monthly { interval: 1, day_of_month: Some(31) };
        assert_eq!(next_occurrence(&pattern, date(2024, 2, 29)), date(2024, 3, 31));
    }

    #[test]
    fn monthly_without_day_reuses_anchor_day() {
        let pattern = RecurrencePattern::Monthly { interval: 2, day_of_month: None };
        assert_eq!(next_occurrence(&pattern, date(2024, 5, 15)), date(2024, 7, 15));
    }

    #[test]
    fn yearly_clamps_leap_day() {
        let pattern = RecurrencePattern::Yearly { interval: 1, day_of_month: None, month: None };
        assert_eq!(next_occurrence(&pattern, date(2024, 2, 29)), date(2025, 2, 28));
    }

    #[test]
    fn yearly_uses_configured_month_and_day() {
        let pattern =
            RecurrencePattern::Yearly { interval: 2, day_of_month: Some(1), month: Some(7) };
        assert_eq!(next_occurrence(&pattern, date(2024, 3, 4)), date(2026, 7, 1));
    }

    #[test]
    fn zero_interval_is_treated_as_one_by_the_math() {
        let pattern = RecurrencePattern::Daily { interval: 0 };
        assert_eq!(next_occurrence(&pattern, date(2024, 3, 4)), date(2024, 3, 5));
    }

    #[test]
    fn validate_rejects_misconfigured_rules() {
        assert!(validate(&RecurrencePattern::Daily { interval: 0 }).is_err());
        assert!(validate(&RecurrencePattern::Monthly { interval: 1, day_of_month: Some(0) })
            .is_err());
        assert!(validate(&RecurrencePattern::Monthly { interval: 1, day_of_month: Some(32) })
            .is_err());
        assert!(validate(&RecurrencePattern::Weekly {
            interval: 1,
            days_of_week: weekdays([7])
        })
        .is_err());
        assert!(validate(&RecurrencePattern::Yearly {
            interval: 1,
            day_of_month: Some(15),
            month: Some(13)
        })
        .is_err());
    }

    #[test]
    fn validate_accepts_tolerant_defaults() {
        assert!(validate(&RecurrencePattern::Weekly {
            interval: 1,
            days_of_week: BTreeSet::new()
        })
        .is_ok());
        assert!(validate(&RecurrencePattern::Yearly {
            interval: 1,
            day_of_month: None,
            month: None
        })
        .is_ok());
    }

    #[test]
    fn due_after_stops_strictly_past_end_date() {
        let rule = RecurrenceRule {
            pattern: RecurrencePattern::Daily { interval: 7 },
            end_date: Some(date(2024, 3, 10)),
            next_occurrence: date(2024, 3, 4),
        };
        // 2024-03-04 + 7d = 2024-03-11, past the end date.
        assert_eq!(rule.due_after(date(2024, 3, 4)), None);
        // An occurrence landing exactly on the end date still fires.
        assert_eq!(rule.due_after(date(2024, 3, 3)), Some(date(2024, 3, 10)));
    }

    fn arb_pattern() -> impl Strategy<Value = RecurrencePattern> {
        prop_oneof![
            (1u32..60).prop_map(|interval| RecurrencePattern::Daily { interval }),
            (1u32..10, proptest::collection::btree_set(0u8..7, 0..7)).prop_map(
                |(interval, days_of_week)| RecurrencePattern::Weekly { interval, days_of_week }
            ),
            (1u32..24, proptest::option::of(1u32..32)).prop_map(|(interval, day_of_month)| {
                RecurrencePattern::Monthly { interval, day_of_month }
            }),
            (1u32..5, proptest::option::of(1u32..32), proptest::option::of(1u32..13)).prop_map(
                |(interval, day_of_month, month)| RecurrencePattern::Yearly {
                    interval,
                    day_of_month,
                    month,
                }
            ),
        ]
    }

    proptest! {
        #[test]
        fn next_occurrence_is_strictly_after_anchor(
            pattern in arb_pattern(),
            days_from_epoch in 0i64..40_000,
        ) {
            let anchor = date(1970, 1, 1) + Duration::days(days_from_epoch);
            prop_assert!(next_occurrence(&pattern, anchor) > anchor);
        }
    }
}
