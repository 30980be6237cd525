//! External store contracts and the file-backed catalog.
//!
//! The schedule and stats services depend only on the traits here. The
//! catalog file (`catalog.json`) holds patients and protocols and is read
//! under a shared lock, written atomically under an exclusive lock.

use crate::{Catalog, DateRange, DoseRecord, Error, Patient, Protocol, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Source of stored protocols
pub trait ProtocolStore {
    fn get_protocol_with_substances(&self, id: &str) -> Result<Option<Protocol>>;
}

/// Source of patient identities
pub trait PatientDirectory {
    fn get_patient(&self, id: &str) -> Result<Option<Patient>>;
}

/// Source of logged doses and side effects
pub trait DoseStore {
    /// Dose records for a patient logged on dates within `range`
    fn find_dose_records(&self, patient_id: &str, range: &DateRange) -> Result<Vec<DoseRecord>>;

    /// Side effects reported by a patient on dates within `range`
    fn count_side_effects(&self, patient_id: &str, range: &DateRange) -> Result<u32>;
}

/// Delegated access check for the calling user
pub trait AccessPolicy {
    /// Fail with [`Error::Forbidden`] unless the caller may act within `clinic_id`
    fn authorize(&self, clinic_id: &str) -> Result<()>;
}

/// Tenant scoping by clinic
///
/// A caller without a clinic is an administrator and may see everything.
#[derive(Clone, Debug, Default)]
pub struct ClinicScope {
    pub clinic_id: Option<String>,
}

impl ClinicScope {
    pub fn admin() -> Self {
        Self { clinic_id: None }
    }

    pub fn clinic(clinic_id: impl Into<String>) -> Self {
        Self {
            clinic_id: Some(clinic_id.into()),
        }
    }
}

impl AccessPolicy for ClinicScope {
    fn authorize(&self, clinic_id: &str) -> Result<()> {
        match &self.clinic_id {
            None => Ok(()),
            Some(own) if own == clinic_id => Ok(()),
            Some(own) => {
                tracing::warn!("Clinic {} denied access to clinic {}", own, clinic_id);
                Err(Error::Forbidden(format!(
                    "caller is not a member of clinic {}",
                    clinic_id
                )))
            }
        }
    }
}

/// JSON file of patients and protocols
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog with a shared lock
    ///
    /// A missing file is an empty catalog. A corrupt file is an error: unlike
    /// logs, silently dropping protocols would hide a data problem.
    pub fn load(&self) -> Result<Catalog> {
        if !self.path.exists() {
            tracing::info!("No catalog found at {:?}, using an empty catalog", self.path);
            return Ok(Catalog::default());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let catalog: Catalog = serde_json::from_str(&contents)?;
        tracing::debug!(
            "Loaded catalog from {:?}: {} patients, {} protocols",
            self.path,
            catalog.patients.len(),
            catalog.protocols.len()
        );
        Ok(catalog)
    }

    /// Save the catalog atomically
    ///
    /// Writes to a temp file in the same directory, syncs, then renames over
    /// the original.
    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Other(format!("catalog path {:?} has no parent", self.path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, catalog)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved catalog to {:?}", self.path);
        Ok(())
    }
}

impl ProtocolStore for FileCatalog {
    fn get_protocol_with_substances(&self, id: &str) -> Result<Option<Protocol>> {
        Ok(self.load()?.protocols.into_iter().find(|p| p.id == id))
    }
}

impl PatientDirectory for FileCatalog {
    fn get_patient(&self, id: &str) -> Result<Option<Patient>> {
        Ok(self.load()?.patients.into_iter().find(|p| p.id == id))
    }
}
