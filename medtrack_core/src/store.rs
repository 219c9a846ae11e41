//! Directory-backed key-value store of JSON records.
//!
//! Layout of a data directory:
//! - `medicines.json` / `schedules.json`: JSON objects mapping id to record
//! - `doses.wal`: append-only dose log (see `wal`)
//! - `doses.csv`: archive the log is rolled up into (see `csv_rollup`)
//!
//! Collection files are rewritten atomically (temp file, fsync, rename) while
//! holding an exclusive lock on `.store.lock`, so concurrent processes never
//! lose each other's updates. Records are decoded one by one: a record that
//! does not decode (for instance a rule whose time is not `HH:MM`) is
//! rejected with a warning and never handed to the engine, but is kept on
//! disk untouched.

use crate::catalog::MedicineCatalog;
use crate::sources::{DosageHistorySource, MedicineSource, ScheduleSource};
use crate::wal::{DoseSink, JsonlSink};
use crate::{DosageHistoryEntry, Error, Medicine, Result, ScheduleRule};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

const MEDICINES_FILE: &str = "medicines.json";
const SCHEDULES_FILE: &str = "schedules.json";
const DOSE_WAL_FILE: &str = "doses.wal";
const DOSE_CSV_FILE: &str = "doses.csv";
const LOCK_FILE: &str = ".store.lock";

type Records = BTreeMap<String, Value>;

/// Handle to an opened data directory. Open once, pass by reference.
#[derive(Clone, Debug)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Open (creating if needed) the store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if let Err(source) = std::fs::create_dir_all(&root) {
            return Err(Error::StoreUnavailable { path: root, source });
        }
        if let Err(source) = OpenOptions::new()
            .create(true)
            .write(true)
            .open(root.join(LOCK_FILE))
        {
            return Err(Error::StoreUnavailable { path: root, source });
        }

        tracing::debug!("Opened store at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dose_wal_path(&self) -> PathBuf {
        self.root.join(DOSE_WAL_FILE)
    }

    pub fn dose_csv_path(&self) -> PathBuf {
        self.root.join(DOSE_CSV_FILE)
    }

    // ------------------------------------------------------------------
    // Medicines
    // ------------------------------------------------------------------

    pub fn medicines(&self) -> Result<Vec<Medicine>> {
        let records = read_records(&self.root.join(MEDICINES_FILE))?;
        Ok(decode_records(&records, "medicine"))
    }

    /// Snapshot of all medicines for lookups
    pub fn catalog(&self) -> Result<MedicineCatalog> {
        Ok(MedicineCatalog::new(self.medicines()?))
    }

    pub fn upsert_medicine(&self, medicine: &Medicine) -> Result<()> {
        self.update_records(MEDICINES_FILE, |records| {
            records.insert(medicine.id.to_string(), serde_json::to_value(medicine)?);
            Ok(())
        })?;
        tracing::info!("Saved medicine {} ({})", medicine.name, medicine.id);
        Ok(())
    }

    /// Remove a medicine. Rules pointing at it are left alone; they are
    /// skipped when schedules are built.
    pub fn remove_medicine(&self, id: Uuid) -> Result<bool> {
        let removed = self.update_records(MEDICINES_FILE, |records| {
            Ok(records.remove(&id.to_string()).is_some())
        })?;
        if removed {
            tracing::info!("Removed medicine {}", id);
        }
        Ok(removed)
    }

    /// Add `delta` to a medicine's stock (negative to take away), floored at zero
    pub fn adjust_stock(&self, id: Uuid, delta: f64) -> Result<Medicine> {
        self.update_records(MEDICINES_FILE, |records| {
            let mut medicine = decode_one::<Medicine>(records, id, "medicine")?;
            medicine.stock = (medicine.stock + delta).max(0.0);
            records.insert(id.to_string(), serde_json::to_value(&medicine)?);
            Ok(medicine)
        })
    }

    // ------------------------------------------------------------------
    // Schedule rules
    // ------------------------------------------------------------------

    /// All decodable rules, paused ones included
    pub fn rules(&self) -> Result<Vec<ScheduleRule>> {
        let records = read_records(&self.root.join(SCHEDULES_FILE))?;
        Ok(decode_records(&records, "schedule rule"))
    }

    pub fn upsert_rule(&self, rule: &ScheduleRule) -> Result<()> {
        self.update_records(SCHEDULES_FILE, |records| {
            records.insert(rule.id.to_string(), serde_json::to_value(rule)?);
            Ok(())
        })?;
        tracing::info!("Saved rule {} at {}", rule.id, rule.time);
        Ok(())
    }

    pub fn remove_rule(&self, id: Uuid) -> Result<bool> {
        self.update_records(SCHEDULES_FILE, |records| {
            Ok(records.remove(&id.to_string()).is_some())
        })
    }

    pub fn set_rule_paused(&self, id: Uuid, paused: bool) -> Result<ScheduleRule> {
        self.update_records(SCHEDULES_FILE, |records| {
            let mut rule = decode_one::<ScheduleRule>(records, id, "schedule rule")?;
            rule.paused = paused;
            records.insert(id.to_string(), serde_json::to_value(&rule)?);
            Ok(rule)
        })
    }

    // ------------------------------------------------------------------
    // Dosage history
    // ------------------------------------------------------------------

    /// The whole dosage history, oldest first
    pub fn history(&self) -> Result<Vec<DosageHistoryEntry>> {
        crate::history::load_history(&self.dose_wal_path(), &self.dose_csv_path())
    }

    /// Append a dose to the log and take its amount out of stock
    ///
    /// Fails with `NotFound` (and logs nothing) if the medicine is unknown.
    /// The stock is persisted first; if the log append then fails, the
    /// previous stock is written back so the two never disagree.
    pub fn record_dose(&self, entry: &DosageHistoryEntry) -> Result<Medicine> {
        let _lock = self.lock()?;
        let path = self.root.join(MEDICINES_FILE);

        let previous = read_records(&path)?;
        let mut medicine = decode_one::<Medicine>(&previous, entry.medicine_id, "medicine")?;
        medicine.stock = (medicine.stock - entry.amount).max(0.0);

        let mut records = previous.clone();
        records.insert(medicine.id.to_string(), serde_json::to_value(&medicine)?);
        write_records(&path, &records)?;

        if let Err(e) = JsonlSink::new(self.dose_wal_path()).append(entry) {
            tracing::warn!(
                "Could not log dose {} of {}, restoring stock: {}",
                entry.id,
                medicine.name,
                e
            );
            write_records(&path, &previous)?;
            return Err(e);
        }

        tracing::info!(
            "Recorded {} {} of {} at {}",
            entry.amount,
            medicine.unit,
            medicine.name,
            entry.taken_at
        );
        Ok(medicine)
    }

    /// Archive the dose WAL into the CSV file
    pub fn rollup(&self, cleanup: bool) -> Result<usize> {
        let _lock = self.lock()?;
        let wal_path = self.dose_wal_path();

        let count = if wal_path.exists() {
            crate::csv_rollup::wal_to_csv_and_archive(&wal_path, &self.dose_csv_path())?
        } else {
            0
        };

        if cleanup {
            crate::csv_rollup::cleanup_processed_wals(&self.root)?;
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Exclusive store lock, released when the returned file is dropped
    fn lock(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.root.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn update_records<F, R>(&self, file_name: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Records) -> Result<R>,
    {
        let _lock = self.lock()?;
        let path = self.root.join(file_name);

        let mut records = read_records(&path)?;
        let out = f(&mut records)?;
        write_records(&path, &records)?;
        Ok(out)
    }
}

impl MedicineSource for JsonStore {
    fn list_medicines(&self) -> Result<Vec<Medicine>> {
        self.medicines()
    }
}

impl ScheduleSource for JsonStore {
    fn list_active(&self, medicine: Option<Uuid>) -> Result<Vec<ScheduleRule>> {
        self.rules()?.as_slice().list_active(medicine)
    }
}

impl DosageHistorySource for JsonStore {
    fn list_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DosageHistoryEntry>> {
        Ok(crate::history::entries_between(&self.history()?, from, to))
    }
}

/// Read a collection file; a missing or empty file is an empty collection
fn read_records(path: &Path) -> Result<Records> {
    if !path.exists() {
        return Ok(Records::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    if contents.trim().is_empty() {
        return Ok(Records::new());
    }

    let records: Records = serde_json::from_str(&contents)?;
    tracing::debug!("Read {} records from {:?}", records.len(), path);
    Ok(records)
}

fn write_records(path: &Path, records: &Records) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Other(format!("Store path {:?} has no parent", path)))?;
    let temp = NamedTempFile::new_in(parent)?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Wrote {} records to {:?}", records.len(), path);
    Ok(())
}

fn decode_records<T: DeserializeOwned>(records: &Records, kind: &str) -> Vec<T> {
    records
        .iter()
        .filter_map(|(key, value)| match serde_json::from_value::<T>(value.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Rejecting {} record {}: {}", kind, key, e);
                None
            }
        })
        .collect()
}

fn decode_one<T: DeserializeOwned>(records: &Records, id: Uuid, kind: &str) -> Result<T> {
    let value = records
        .get(&id.to_string())
        .ok_or_else(|| Error::NotFound(format!("{} {}", kind, id)))?;
    Ok(serde_json::from_value(value.clone())?)
}
