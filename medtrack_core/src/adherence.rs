//! Weekly adherence classification.
//!
//! For each of seven consecutive days the expected dose count (one per rule
//! recurring that day) is compared with the number of doses recorded on that
//! calendar date. Recorded doses are matched by date only, not by medicine
//! or time slot.

use crate::recurrence::{occurrences_on, DayOfWeek};
use crate::{DosageHistoryEntry, ScheduleRule};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of days in an adherence window
pub const WINDOW_DAYS: usize = 7;

/// How completely a day's expected doses were taken
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdherenceStatus {
    None,
    Partial,
    Complete,
}

impl AdherenceStatus {
    /// Classify a day from its expected and taken counts
    ///
    /// Nothing taken is `None` whatever was expected. Otherwise the day is
    /// `Complete` when at least the expected number was taken and something
    /// was expected, and `Partial` in every other case.
    pub fn classify(expected: u32, taken: u32) -> Self {
        if taken == 0 {
            AdherenceStatus::None
        } else if expected > 0 && taken >= expected {
            AdherenceStatus::Complete
        } else {
            AdherenceStatus::Partial
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAdherence {
    pub date: NaiveDate,
    pub weekday: DayOfWeek,
    pub day_number: u32,
    pub month: u32,
    pub status: AdherenceStatus,
    pub expected_count: u32,
    pub taken_count: u32,
}

/// Seven consecutive days of adherence starting at `window_start`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAdherence {
    pub window_start: NaiveDate,
    pub days: Vec<DayAdherence>,
}

impl WeeklyAdherence {
    pub fn day(&self, date: NaiveDate) -> Option<&DayAdherence> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn count(&self, status: AdherenceStatus) -> usize {
        self.days.iter().filter(|d| d.status == status).count()
    }
}

/// Compute adherence for the 7 days beginning at `window_start`
pub fn compute_weekly_adherence(
    rules: &[ScheduleRule],
    history: &[DosageHistoryEntry],
    window_start: NaiveDate,
) -> WeeklyAdherence {
    let mut taken_by_date: HashMap<NaiveDate, u32> = HashMap::new();
    for entry in history {
        *taken_by_date.entry(entry.date()).or_insert(0) += 1;
    }

    let days = window_start
        .iter_days()
        .take(WINDOW_DAYS)
        .map(|date| {
            let expected_count = occurrences_on(rules, date).count() as u32;
            let taken_count = taken_by_date.get(&date).copied().unwrap_or(0);

            DayAdherence {
                date,
                weekday: DayOfWeek::of(date),
                day_number: date.day(),
                month: date.month(),
                status: AdherenceStatus::classify(expected_count, taken_count),
                expected_count,
                taken_count,
            }
        })
        .collect();

    WeeklyAdherence { window_start, days }
}

/// Monday of the calendar week containing `date`
pub fn week_start_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Start of the 7-day window that ends with `today`
pub fn trailing_window_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(WINDOW_DAYS as i64 - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TimeOfDay, WeekdaySet};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily_rule(medicine_id: Uuid, time: &str) -> ScheduleRule {
        ScheduleRule::new(medicine_id, time.parse().unwrap(), 1.0, WeekdaySet::new())
    }

    fn taken(medicine_id: Uuid, on: NaiveDate, h: u32, m: u32) -> DosageHistoryEntry {
        DosageHistoryEntry::new(medicine_id, on.and_hms_opt(h, m, 0).unwrap(), 1.0)
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(AdherenceStatus::classify(3, 3), AdherenceStatus::Complete);
        assert_eq!(AdherenceStatus::classify(3, 1), AdherenceStatus::Partial);
        assert_eq!(AdherenceStatus::classify(3, 0), AdherenceStatus::None);
        assert_eq!(AdherenceStatus::classify(0, 0), AdherenceStatus::None);
        assert_eq!(AdherenceStatus::classify(2, 5), AdherenceStatus::Complete);
        assert_eq!(AdherenceStatus::classify(0, 1), AdherenceStatus::Partial);
    }

    #[test]
    fn test_window_covers_seven_consecutive_days() {
        let start = date(2024, 2, 26);
        let week = compute_weekly_adherence(&[], &[], start);

        assert_eq!(week.window_start, start);
        assert_eq!(week.days.len(), WINDOW_DAYS);
        assert_eq!(week.days[0].date, start);
        assert_eq!(week.days[6].date, date(2024, 3, 3));
        // Leap-year month boundary
        assert_eq!(week.days[3].day_number, 29);
        assert_eq!(week.days[3].month, 2);
        assert_eq!(week.days[4].month, 3);
        assert_eq!(week.days[0].weekday, DayOfWeek::Monday);
        assert!(week.days.iter().all(|d| d.status == AdherenceStatus::None));
    }

    #[test]
    fn test_expected_counts_one_per_active_rule() {
        let m = Uuid::new_v4();
        let mondays: WeekdaySet = [DayOfWeek::Monday].into_iter().collect();
        let rules = vec![
            daily_rule(m, "08:00"),
            // Shares the 08:00 slot but still counts separately
            daily_rule(Uuid::new_v4(), "08:00"),
            ScheduleRule::new(m, TimeOfDay::new(20, 0).unwrap(), 1.0, mondays),
        ];

        let week = compute_weekly_adherence(&rules, &[], date(2024, 1, 1));

        assert_eq!(week.days[0].expected_count, 3); // Monday
        for day in &week.days[1..] {
            assert_eq!(day.expected_count, 2);
        }
    }

    #[test]
    fn test_taken_matches_by_calendar_date_only() {
        let m = Uuid::new_v4();
        let other = Uuid::new_v4();
        let d = date(2024, 1, 3);
        let rules = vec![daily_rule(m, "08:00"), daily_rule(m, "20:00")];
        let history = vec![
            // A different medicine and an odd time still count for the day
            taken(other, d, 3, 0),
            taken(m, d, 23, 59),
            taken(m, d.succ_opt().unwrap(), 0, 0),
        ];

        let week = compute_weekly_adherence(&rules, &history, date(2024, 1, 1));
        let day = week.day(d).unwrap();

        assert_eq!(day.taken_count, 2);
        assert_eq!(day.status, AdherenceStatus::Complete);

        let next = week.day(date(2024, 1, 4)).unwrap();
        assert_eq!(next.taken_count, 1);
        assert_eq!(next.status, AdherenceStatus::Partial);
    }

    #[test]
    fn test_history_outside_window_is_ignored() {
        let m = Uuid::new_v4();
        let rules = vec![daily_rule(m, "08:00")];
        let history = vec![
            taken(m, date(2023, 12, 31), 8, 0),
            taken(m, date(2024, 1, 8), 8, 0),
        ];

        let week = compute_weekly_adherence(&rules, &history, date(2024, 1, 1));
        assert_eq!(week.count(AdherenceStatus::None), 7);
    }

    #[test]
    fn test_empty_weekday_set_counts_every_day() {
        let rules = vec![daily_rule(Uuid::new_v4(), "09:00")];
        let week = compute_weekly_adherence(&rules, &[], date(2024, 6, 12));
        assert!(week.days.iter().all(|d| d.expected_count == 1));
    }

    #[test]
    fn test_deterministic() {
        let m = Uuid::new_v4();
        let rules = vec![daily_rule(m, "08:00"), daily_rule(m, "12:00")];
        let history = vec![
            taken(m, date(2024, 1, 2), 8, 1),
            taken(m, date(2024, 1, 2), 12, 3),
            taken(m, date(2024, 1, 5), 8, 0),
        ];

        let first = compute_weekly_adherence(&rules, &history, date(2024, 1, 1));
        let second = compute_weekly_adherence(&rules, &history, date(2024, 1, 1));
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_status_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&AdherenceStatus::Complete).unwrap(),
            r#""COMPLETE""#
        );
        assert_eq!(serde_json::to_string(&AdherenceStatus::None).unwrap(), r#""NONE""#);
    }

    #[test]
    fn test_window_anchors() {
        // 2024-01-04 was a Thursday
        assert_eq!(week_start_monday(date(2024, 1, 4)), date(2024, 1, 1));
        assert_eq!(week_start_monday(date(2024, 1, 1)), date(2024, 1, 1));
        assert_eq!(week_start_monday(date(2024, 1, 7)), date(2024, 1, 1));
        assert_eq!(trailing_window_start(date(2024, 1, 7)), date(2024, 1, 1));
    }
}
