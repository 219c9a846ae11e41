//! Recurrence expansion for weekly schedule rules.
//!
//! A rule recurs on a set of weekdays. The persisted form of that set is a
//! list of short codes (`"MON"`, `"TUE"`, ...). Decoding it is lax: codes
//! that are not in the table are dropped with a warning instead of failing
//! the whole rule. User input goes through [`WeekdaySet::parse_strict`].
//!
//! An empty set means the rule is active every day.

use crate::{Error, Result, ScheduleRule};
use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Day of the week, Monday first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

const CODE_TABLE: [(&str, DayOfWeek); 7] = [
    ("MON", DayOfWeek::Monday),
    ("TUE", DayOfWeek::Tuesday),
    ("WED", DayOfWeek::Wednesday),
    ("THU", DayOfWeek::Thursday),
    ("FRI", DayOfWeek::Friday),
    ("SAT", DayOfWeek::Saturday),
    ("SUN", DayOfWeek::Sunday),
];

static DAYS_BY_CODE: Lazy<HashMap<&'static str, DayOfWeek>> =
    Lazy::new(|| CODE_TABLE.iter().copied().collect());

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Persisted code for this day
    pub fn code(self) -> &'static str {
        CODE_TABLE[self as usize].0
    }

    /// Look up a day by its code (case-insensitive)
    pub fn from_code(code: &str) -> Option<Self> {
        DAYS_BY_CODE
            .get(code.trim().to_ascii_uppercase().as_str())
            .copied()
    }

    /// Weekday of a calendar date
    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The weekdays a rule recurs on. No duplicates, iterates Monday first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WeekdaySet(BTreeSet<DayOfWeek>);

impl WeekdaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// All seven days, spelled out
    pub fn every_day() -> Self {
        DayOfWeek::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, day: DayOfWeek) -> bool {
        self.0.insert(day)
    }

    /// Plain membership test
    pub fn contains(&self, day: DayOfWeek) -> bool {
        self.0.contains(&day)
    }

    /// Whether a rule with this set recurs on `day`. An empty set recurs daily.
    pub fn matches(&self, day: DayOfWeek) -> bool {
        self.0.is_empty() || self.0.contains(&day)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = DayOfWeek> + '_ {
        self.0.iter().copied()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.iter().map(DayOfWeek::code).collect()
    }

    /// Decode persisted codes, dropping any that are not in the code table
    pub fn decode_lax<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        let mut dropped = Vec::new();
        for code in codes {
            let code = code.as_ref();
            match DayOfWeek::from_code(code) {
                Some(day) => {
                    set.insert(day);
                }
                None => {
                    tracing::warn!("Dropping unknown weekday code {:?}", code);
                    dropped.push(code.to_string());
                }
            }
        }
        if set.is_empty() && !dropped.is_empty() {
            tracing::warn!(
                "No known weekday codes in {:?}; the rule now recurs every day",
                dropped
            );
        }
        set
    }

    /// Parse a comma-separated list of codes, rejecting unknown ones
    ///
    /// An empty or blank string yields the empty set.
    pub fn parse_strict(s: &str) -> Result<Self> {
        let mut set = Self::new();
        for code in s.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let day = DayOfWeek::from_code(code)
                .ok_or_else(|| Error::InvalidRecurrenceCode(code.to_string()))?;
            set.insert(day);
        }
        Ok(set)
    }
}

impl FromIterator<DayOfWeek> for WeekdaySet {
    fn from_iter<T: IntoIterator<Item = DayOfWeek>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("every day")
        } else {
            f.write_str(&self.codes().join(","))
        }
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for day in self.iter() {
            seq.serialize_element(day.code())?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for WeekdaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let codes = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::decode_lax(codes))
    }
}

// ============================================================================
// Expansion
// ============================================================================

/// Whether `rule` produces an occurrence on `date`
pub fn is_active(rule: &ScheduleRule, date: NaiveDate) -> bool {
    rule.days.matches(DayOfWeek::of(date))
}

/// Rules that have an occurrence on `date`, in input order
pub fn occurrences_on(
    rules: &[ScheduleRule],
    date: NaiveDate,
) -> impl Iterator<Item = &ScheduleRule> + '_ {
    rules.iter().filter(move |rule| is_active(rule, date))
}

/// Dates within `count` consecutive days starting at `from` on which `rule` is active
pub fn active_dates(rule: &ScheduleRule, from: NaiveDate, count: usize) -> Vec<NaiveDate> {
    from.iter_days()
        .take(count)
        .filter(|date| is_active(rule, *date))
        .collect()
}
