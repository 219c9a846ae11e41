//! Medicine lookup and snapshot validation.
//!
//! The engine resolves medicine references through [`MedicineLookup`]. A
//! [`MedicineCatalog`] is the usual implementation: an in-memory snapshot
//! built once per request from whatever the store returned.

use crate::{Medicine, ScheduleRule};
use std::collections::HashMap;
use uuid::Uuid;

/// Read-only lookup of medicines by id. `None` means not found.
pub trait MedicineLookup {
    fn get(&self, id: &Uuid) -> Option<&Medicine>;
}

impl MedicineLookup for HashMap<Uuid, Medicine> {
    fn get(&self, id: &Uuid) -> Option<&Medicine> {
        HashMap::get(self, id)
    }
}

/// Snapshot of the user's medicines, keyed by id
#[derive(Clone, Debug, Default)]
pub struct MedicineCatalog {
    medicines: HashMap<Uuid, Medicine>,
}

impl MedicineCatalog {
    pub fn new(medicines: impl IntoIterator<Item = Medicine>) -> Self {
        Self {
            medicines: medicines.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.medicines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medicines.is_empty()
    }

    /// Medicines sorted by name, for stable display
    pub fn sorted_by_name(&self) -> Vec<&Medicine> {
        let mut all: Vec<_> = self.medicines.values().collect();
        all.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        all
    }

    /// Find a medicine by id string or by case-insensitive exact name
    pub fn resolve(&self, key: &str) -> Option<&Medicine> {
        if let Ok(id) = Uuid::parse_str(key.trim()) {
            if let Some(medicine) = self.medicines.get(&id) {
                return Some(medicine);
            }
        }
        let wanted = key.trim().to_lowercase();
        self.sorted_by_name()
            .into_iter()
            .find(|m| m.name.to_lowercase() == wanted)
    }

    /// Validate the snapshot together with the rules that reference it
    ///
    /// Returns a list of human-readable problems; an empty list means the
    /// data is consistent. Problems found here are not fatal to the engine
    /// (a dangling reference is simply skipped when building a schedule).
    pub fn validate(&self, rules: &[ScheduleRule]) -> Vec<String> {
        let mut errors = Vec::new();

        for medicine in self.sorted_by_name() {
            if medicine.name.trim().is_empty() {
                errors.push(format!("Medicine '{}' has an empty name", medicine.id));
            }
            if medicine.stock < 0.0 {
                errors.push(format!(
                    "Medicine '{}': negative stock {}",
                    medicine.name, medicine.stock
                ));
            }
            if medicine.dose_amount <= 0.0 {
                errors.push(format!(
                    "Medicine '{}': dose amount {} must be positive",
                    medicine.name, medicine.dose_amount
                ));
            }
        }

        for rule in rules {
            if !self.medicines.contains_key(&rule.medicine_id) {
                errors.push(format!(
                    "Rule '{}' at {} references missing medicine '{}'",
                    rule.id, rule.time, rule.medicine_id
                ));
            }
            if rule.amount <= 0.0 {
                errors.push(format!(
                    "Rule '{}' at {}: amount {} must be positive",
                    rule.id, rule.time, rule.amount
                ));
            }
        }

        errors
    }
}

impl MedicineLookup for MedicineCatalog {
    fn get(&self, id: &Uuid) -> Option<&Medicine> {
        self.medicines.get(id)
    }
}
