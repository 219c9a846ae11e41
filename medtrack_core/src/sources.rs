//! Read-only capabilities the caller uses to fetch engine inputs.
//!
//! The engine itself only ever sees the snapshots these return.

use crate::{DosageHistoryEntry, Medicine, Result, ScheduleRule};
use chrono::NaiveDate;
use uuid::Uuid;

pub trait MedicineSource {
    fn list_medicines(&self) -> Result<Vec<Medicine>>;
}

pub trait ScheduleSource {
    /// Rules that are not paused, optionally only those for one medicine
    fn list_active(&self, medicine: Option<Uuid>) -> Result<Vec<ScheduleRule>>;
}

pub trait DosageHistorySource {
    /// Entries dated in `[from, to)`, oldest first
    fn list_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DosageHistoryEntry>>;
}

impl ScheduleSource for [ScheduleRule] {
    fn list_active(&self, medicine: Option<Uuid>) -> Result<Vec<ScheduleRule>> {
        Ok(self
            .iter()
            .filter(|rule| !rule.paused)
            .filter(|rule| medicine.map_or(true, |id| rule.medicine_id == id))
            .cloned()
            .collect())
    }
}

impl DosageHistorySource for [DosageHistoryEntry] {
    fn list_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DosageHistoryEntry>> {
        let mut entries = crate::history::entries_between(self, from, to);
        entries.sort_by(|a, b| a.taken_at.cmp(&b.taken_at));
        Ok(entries)
    }
}
