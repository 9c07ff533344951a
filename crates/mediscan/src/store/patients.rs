//! Patient registration and the rename cascade.

use chrono::Utc;
use tracing::{debug, info};

use super::{next_id, RecordStore};
use crate::error::{Error, Result};
use crate::records::{NewPatient, Patient, PatientPatch, Scan};
use crate::storage::{Batch, StoreKey};

/// Width of the numeric part of a patient code.
const PATIENT_CODE_WIDTH: usize = 5;

/// Format the human-facing patient code for sequence number `n`.
#[must_use]
pub fn format_patient_code(n: usize) -> String {
    format!("P-{n:0width$}", width = PATIENT_CODE_WIDTH)
}

impl RecordStore {
    /// All patients in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn list_patients(&self) -> Result<Vec<Patient>> {
        self.storage.get_list(StoreKey::Patients)
    }

    /// Look up a patient by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn find_patient(&self, id: &str) -> Result<Option<Patient>> {
        Ok(self.list_patients()?.into_iter().find(|p| p.id == id))
    }

    /// The next free patient code: `P-` and the zero-padded count plus one,
    /// stepped forward if that code is already taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn next_patient_code(&self) -> Result<String> {
        let patients = self.list_patients()?;
        let mut n = patients.len() + 1;
        loop {
            let code = format_patient_code(n);
            if !patients.iter().any(|p| p.patient_code == code) {
                return Ok(code);
            }
            n += 1;
        }
    }

    /// Register a patient, assigning `id` and `createdAt`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the patient code is taken, or an error
    /// if the write fails.
    pub fn create_patient(&self, new: NewPatient) -> Result<Patient> {
        let mut patients = self.list_patients()?;
        if patients.iter().any(|p| p.patient_code == new.patient_code) {
            return Err(Error::conflict("patient code", new.patient_code));
        }

        let id = next_id("PAT", |id| patients.iter().any(|p| p.id == id));
        let patient = new.into_patient(id, Utc::now());
        patients.push(patient.clone());
        self.storage.put(StoreKey::Patients, &patients)?;

        info!("Registered patient {} ({})", patient.patient_code, patient.id);
        Ok(patient)
    }

    /// Apply `patch` to the patient `id`. Returns `None` if no such patient.
    ///
    /// When the patch renames the patient, every scan of that patient gets the
    /// new `patientName` in the same transaction as the patient write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the new code belongs to another patient,
    /// or an error if the write fails; nothing is written then.
    pub fn update_patient(&self, id: &str, patch: PatientPatch) -> Result<Option<Patient>> {
        let mut patients = self.list_patients()?;
        let Some(index) = patients.iter().position(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(code) = &patch.patient_code {
            if patients.iter().any(|p| p.id != id && &p.patient_code == code) {
                return Err(Error::conflict("patient code", code.as_str()));
            }
        }

        let new_name = patch.name.clone();
        patch.apply(&mut patients[index]);
        let updated = patients[index].clone();

        let mut batch = Batch::new().put(StoreKey::Patients, &patients)?;
        if let Some(name) = new_name {
            let mut scans: Vec<Scan> = self.storage.get_list(StoreKey::Scans)?;
            let mut renamed = 0;
            for scan in scans.iter_mut().filter(|s| s.patient_id == id) {
                scan.patient_name.clone_from(&name);
                renamed += 1;
            }
            if renamed > 0 {
                batch = batch.put(StoreKey::Scans, &scans)?;
                debug!("Renaming patient {} on {} scans", id, renamed);
            }
        }
        self.storage.commit(batch)?;

        Ok(Some(updated))
    }

    /// Patients whose name or code contains `term`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn search_patients(&self, term: &str) -> Result<Vec<Patient>> {
        let needle = term.to_lowercase();
        Ok(self
            .list_patients()?
            .into_iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.patient_code.to_lowercase().contains(&needle)
            })
            .collect())
    }
}
