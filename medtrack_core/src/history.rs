//! Dosage history loading.
//!
//! The history lives in two places: the live WAL and the CSV archive it is
//! rolled up into. This module merges both into a single chronological log.

use crate::csv_rollup::CsvRow;
use crate::{DosageHistoryEntry, Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

impl TryFrom<CsvRow> for DosageHistoryEntry {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Other(format!("Invalid UUID: {}", e)))?;
        let medicine_id = Uuid::parse_str(&row.medicine_id)
            .map_err(|e| Error::Other(format!("Invalid medicine UUID: {}", e)))?;
        let taken_at = row
            .taken_at
            .parse::<NaiveDateTime>()
            .map_err(|e| Error::Other(format!("Invalid timestamp: {}", e)))?;

        Ok(DosageHistoryEntry {
            id,
            medicine_id,
            taken_at,
            amount: row.amount,
        })
    }
}

/// Load the full dosage history from the WAL and the CSV archive
///
/// Returns entries sorted by `taken_at` (oldest first). An entry present
/// in both files is returned once.
pub fn load_history(wal_path: &Path, csv_path: &Path) -> Result<Vec<DosageHistoryEntry>> {
    let mut entries = Vec::new();
    let mut seen_ids = HashSet::new();

    if wal_path.exists() {
        for entry in crate::wal::read_entries(wal_path)? {
            if seen_ids.insert(entry.id) {
                entries.push(entry);
            }
        }
        tracing::debug!("Loaded {} doses from WAL", entries.len());
    }

    if csv_path.exists() {
        let mut csv_count = 0;
        for entry in load_entries_from_csv(csv_path)? {
            if seen_ids.insert(entry.id) {
                entries.push(entry);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} doses from CSV", csv_count);
    }

    entries.sort_by(|a, b| a.taken_at.cmp(&b.taken_at));

    tracing::info!("Loaded {} doses in total", entries.len());
    Ok(entries)
}

/// Entries whose calendar date falls in `[from, to)`
pub fn entries_between(
    history: &[DosageHistoryEntry],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<DosageHistoryEntry> {
    history
        .iter()
        .filter(|e| {
            let date = e.date();
            date >= from && date < to
        })
        .cloned()
        .collect()
}

fn load_entries_from_csv(path: &Path) -> Result<Vec<DosageHistoryEntry>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut entries = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match DosageHistoryEntry::try_from(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Failed to parse CSV row: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    Ok(entries)
}
