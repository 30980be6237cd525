//! Append-only dose and side-effect log.
//!
//! Records are appended to JSONL (JSON Lines) files with file locking so
//! concurrent writers never interleave partial lines. Unparseable lines are
//! skipped with a warning rather than failing the whole read.

use crate::store::DoseStore;
use crate::{DateRange, DoseRecord, Result, SideEffectRecord};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Sink trait for recording patient-reported events
pub trait DoseSink {
    fn record_dose(&mut self, record: &DoseRecord) -> Result<()>;
    fn record_side_effect(&mut self, record: &SideEffectRecord) -> Result<()>;
}

/// File-backed dose store: `doses.jsonl` and `side_effects.jsonl` in one directory
pub struct DoseLog {
    doses_path: PathBuf,
    side_effects_path: PathBuf,
}

impl DoseLog {
    /// Create a log rooted at `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            doses_path: dir.join("doses.jsonl"),
            side_effects_path: dir.join("side_effects.jsonl"),
        }
    }

    pub fn doses_path(&self) -> &Path {
        &self.doses_path
    }

    /// All dose records, in log order
    pub fn read_doses(&self) -> Result<Vec<DoseRecord>> {
        read_lines(&self.doses_path)
    }

    /// All side-effect records, in log order
    pub fn read_side_effects(&self) -> Result<Vec<SideEffectRecord>> {
        read_lines(&self.side_effects_path)
    }
}

impl DoseSink for DoseLog {
    fn record_dose(&mut self, record: &DoseRecord) -> Result<()> {
        record.validate()?;
        append_line(&self.doses_path, record)?;
        tracing::debug!("Appended dose {} to log", record.id);
        Ok(())
    }

    fn record_side_effect(&mut self, record: &SideEffectRecord) -> Result<()> {
        append_line(&self.side_effects_path, record)?;
        tracing::debug!("Appended side effect {} to log", record.id);
        Ok(())
    }
}

impl DoseStore for DoseLog {
    fn find_dose_records(&self, patient_id: &str, range: &DateRange) -> Result<Vec<DoseRecord>> {
        let mut records: Vec<_> = self
            .read_doses()?
            .into_iter()
            .filter(|r| r.patient_id == patient_id && range.contains(r.logged_at.date_naive()))
            .collect();
        records.sort_by_key(|r| r.logged_at);

        tracing::debug!(
            "Found {} dose records for {} between {} and {}",
            records.len(),
            patient_id,
            range.start,
            range.end
        );
        Ok(records)
    }

    fn count_side_effects(&self, patient_id: &str, range: &DateRange) -> Result<u32> {
        let count = self
            .read_side_effects()?
            .iter()
            .filter(|r| r.patient_id == patient_id && range.contains(r.logged_at.date_naive()))
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

/// Append one record as a JSON line under an exclusive lock
fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;

    let mut writer = std::io::BufWriter::new(&file);
    let line = serde_json::to_string(record)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    drop(writer);

    file.unlock()?;
    Ok(())
}

/// Read every parseable JSON line under a shared lock
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    "Skipping unparseable line {} in {:?}: {}",
                    line_num + 1,
                    path,
                    e
                );
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} records from {:?}", records.len(), path);
    Ok(records)
}
