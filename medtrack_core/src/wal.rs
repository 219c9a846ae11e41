//! Write-Ahead Log (WAL) for the dosage history.
//!
//! Doses are appended to a JSONL (JSON Lines) file with file locking
//! to ensure safe concurrent access. The log is never rewritten in place;
//! it is only rolled up into the CSV archive (see `csv_rollup`).

use crate::{DosageHistoryEntry, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Dose sink trait for persisting dosage history entries
pub trait DoseSink {
    fn append(&mut self, entry: &DosageHistoryEntry) -> Result<()>;
}

/// JSONL-based dose sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl DoseSink for JsonlSink {
    fn append(&mut self, entry: &DosageHistoryEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;

        file.unlock()?;

        tracing::debug!("Appended dose {} to WAL", entry.id);
        Ok(())
    }
}

/// Read all entries from a WAL file
///
/// Lines that fail to parse (e.g. a partial write after a crash) are
/// skipped with a warning.
pub fn read_entries(path: &Path) -> Result<Vec<DosageHistoryEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DosageHistoryEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse dose at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} doses from WAL", entries.len());
    Ok(entries)
}
