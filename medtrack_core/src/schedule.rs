//! Daily schedule builder.
//!
//! Turns the recurring rules into the concrete list of time slots for one
//! calendar date:
//! - keep rules that recur on the date
//! - group them by time of day (ascending)
//! - resolve each rule's medicine, skipping rules whose medicine is gone

use crate::catalog::MedicineLookup;
use crate::recurrence::is_active;
use crate::{Medicine, ScheduleRule, TimeOfDay};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// One medicine to take within a time slot
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ScheduledDose {
    pub rule_id: Uuid,
    pub medicine: Medicine,
    pub amount: f64,
}

/// Everything scheduled at one time of day
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TimeSlot {
    pub time: TimeOfDay,
    pub doses: Vec<ScheduledDose>,
}

/// A rule was skipped because its medicine could not be resolved
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MissingReferenceWarning {
    pub rule_id: Uuid,
    pub medicine_id: Uuid,
    pub time: TimeOfDay,
}

impl fmt::Display for MissingReferenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule {} at {} references missing medicine {}",
            self.rule_id, self.time, self.medicine_id
        )
    }
}

/// The ordered time slots for one date
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DailySchedule {
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<MissingReferenceWarning>,
}

impl DailySchedule {
    /// Total number of doses across all slots
    pub fn dose_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.doses.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Build the schedule for `date`
///
/// Rules referencing a medicine that `medicines` cannot resolve are left out
/// and reported in [`DailySchedule::warnings`]; the rest of the day is still
/// built. A slot left with no resolvable doses is omitted.
pub fn build_daily_schedule<L: MedicineLookup + ?Sized>(
    rules: &[ScheduleRule],
    medicines: &L,
    date: NaiveDate,
) -> DailySchedule {
    let mut by_time: BTreeMap<TimeOfDay, Vec<ScheduledDose>> = BTreeMap::new();
    let mut warnings = Vec::new();

    for rule in rules.iter().filter(|rule| is_active(rule, date)) {
        match medicines.get(&rule.medicine_id) {
            Some(medicine) => {
                by_time.entry(rule.time).or_default().push(ScheduledDose {
                    rule_id: rule.id,
                    medicine: medicine.clone(),
                    amount: rule.amount,
                });
            }
            None => {
                tracing::debug!(
                    "Skipping rule {} on {}: medicine {} not found",
                    rule.id,
                    date,
                    rule.medicine_id
                );
                warnings.push(MissingReferenceWarning {
                    rule_id: rule.id,
                    medicine_id: rule.medicine_id,
                    time: rule.time,
                });
            }
        }
    }

    let slots = by_time
        .into_iter()
        .map(|(time, doses)| TimeSlot { time, doses })
        .collect();

    DailySchedule {
        date,
        slots,
        warnings,
    }
}
