//! Core domain types for the medtrack system.
//!
//! This module defines the persisted records the engine works over:
//! - Medicines and their stock
//! - Recurring schedule rules (time-of-day + weekday set)
//! - Dosage history entries (the append-only log of doses taken)
//!
//! Derived values (time slots, adherence, forecasts) live next to the
//! component that computes them.

use crate::recurrence::WeekdaySet;
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Time of day
// ============================================================================

/// A validated 24-hour clock value, rendered as fixed-width `HH:MM`.
///
/// Ordering is by (hour, minute), which agrees with lexicographic ordering
/// of the rendered form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::InvalidTimeFormat(format!("{}:{}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidTimeFormat(s.to_string());

        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let fixed_width = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !fixed_width(h) || !fixed_width(m) {
            return Err(invalid());
        }

        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> Self {
        time.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

// ============================================================================
// Persisted records
// ============================================================================

/// A medicine the user keeps in stock
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub dose_amount: f64,
    pub unit: String,
    pub stock: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<NaiveDate>,
}

impl Medicine {
    pub fn new(name: impl Into<String>, dose_amount: f64, unit: impl Into<String>, stock: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            dose_amount,
            unit: unit.into(),
            stock,
            description: None,
            expires_on: None,
        }
    }
}

/// A recurring weekly instruction to take `amount` of a medicine at `time`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScheduleRule {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub time: TimeOfDay,
    pub amount: f64,
    /// Empty means every day
    #[serde(default)]
    pub days: WeekdaySet,
    #[serde(default)]
    pub paused: bool,
}

impl ScheduleRule {
    pub fn new(medicine_id: Uuid, time: TimeOfDay, amount: f64, days: WeekdaySet) -> Self {
        Self {
            id: Uuid::new_v4(),
            medicine_id,
            time,
            amount,
            days,
            paused: false,
        }
    }
}

/// One dose actually taken. Entries are appended, never edited.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DosageHistoryEntry {
    pub id: Uuid,
    pub medicine_id: Uuid,
    /// Local wall-clock time the dose was taken
    pub taken_at: NaiveDateTime,
    pub amount: f64,
}

impl DosageHistoryEntry {
    pub fn new(medicine_id: Uuid, taken_at: NaiveDateTime, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            medicine_id,
            taken_at,
            amount,
        }
    }

    /// Calendar date the dose counts towards
    pub fn date(&self) -> NaiveDate {
        self.taken_at.date()
    }
}
