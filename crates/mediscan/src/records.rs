//! Record types for mediscan.
//!
//! This module defines the three persisted collections (accounts, patients,
//! scans), the patches used to update them, and the session record. Field and
//! variant names serialize with the camelCase spellings of the stored layout.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Account role. `Admin` manages accounts, `Doctor` reviews scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Administrative account.
    Admin,
    /// Clinical-review account.
    Doctor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.pad("Admin"),
            Self::Doctor => f.pad("Doctor"),
        }
    }
}

/// Patient gender, as offered on the registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Other.
    Other,
    /// Declined to answer.
    #[serde(rename = "Prefer not to say")]
    PreferNotToSay,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => f.pad("Male"),
            Self::Female => f.pad("Female"),
            Self::Other => f.pad("Other"),
            Self::PreferNotToSay => f.pad("Prefer not to say"),
        }
    }
}

/// Imaging modality of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanType {
    /// Computed tomography.
    #[serde(rename = "CT")]
    Ct,
    /// Plain radiograph.
    #[serde(rename = "X-Ray")]
    XRay,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ct => f.pad("CT"),
            Self::XRay => f.pad("X-Ray"),
        }
    }
}

/// Review disposition of a scan.
///
/// Any status may be set from any other; the store does not enforce an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScanStatus {
    /// Uploaded, not yet reviewed.
    #[default]
    Pending,
    /// Reviewed with no further action.
    Reviewed,
    /// Reviewed and flagged for follow-up.
    #[serde(rename = "Requires Follow-up")]
    RequiresFollowUp,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.pad("Pending"),
            Self::Reviewed => f.pad("Reviewed"),
            Self::RequiresFollowUp => f.pad("Requires Follow-up"),
        }
    }
}

/// A registered patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Store-generated key. Never changes.
    pub id: String,
    /// Full name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Human-facing code such as `P-00001`.
    #[serde(rename = "patientId")]
    pub patient_code: String,
    /// Contact phone number.
    pub contact_number: String,
    /// Gender, if given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Registration time. Set once.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when registering a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    /// Full name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Human-facing code.
    pub patient_code: String,
    /// Contact phone number.
    pub contact_number: String,
    /// Gender, if given.
    pub gender: Option<Gender>,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl NewPatient {
    /// Create a registration with the required fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        age: u32,
        patient_code: impl Into<String>,
        contact_number: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            age,
            patient_code: patient_code.into(),
            contact_number: contact_number.into(),
            gender: None,
            notes: None,
        }
    }

    /// Set the gender.
    #[must_use]
    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    /// Set the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub(crate) fn into_patient(self, id: String, created_at: DateTime<Utc>) -> Patient {
        Patient {
            id,
            name: self.name,
            age: self.age,
            patient_code: self.patient_code,
            contact_number: self.contact_number,
            gender: self.gender,
            notes: self.notes,
            created_at,
        }
    }
}

/// Shallow patch over a patient. `None` leaves a field unchanged; for the
/// optional fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientPatch {
    /// New name. Propagates to the patient's scans.
    pub name: Option<String>,
    /// New age.
    pub age: Option<u32>,
    /// New human-facing code.
    pub patient_code: Option<String>,
    /// New contact number.
    pub contact_number: Option<String>,
    /// New gender, or `Some(None)` to clear it.
    pub gender: Option<Option<Gender>>,
    /// New notes, or `Some(None)` to clear them.
    pub notes: Option<Option<String>>,
}

impl PatientPatch {
    pub(crate) fn apply(self, patient: &mut Patient) {
        if let Some(name) = self.name {
            patient.name = name;
        }
        if let Some(age) = self.age {
            patient.age = age;
        }
        if let Some(code) = self.patient_code {
            patient.patient_code = code;
        }
        if let Some(contact) = self.contact_number {
            patient.contact_number = contact;
        }
        if let Some(gender) = self.gender {
            patient.gender = gender;
        }
        if let Some(notes) = self.notes {
            patient.notes = notes;
        }
    }
}

/// An uploaded diagnostic scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    /// Store-generated key.
    pub id: String,
    /// The owning patient's `id`.
    pub patient_id: String,
    /// Copy of the owning patient's name, kept in sync on rename.
    pub patient_name: String,
    /// Imaging modality.
    pub scan_type: ScanType,
    /// Opaque encoded image payload.
    pub image_data: String,
    /// Review disposition.
    pub status: ScanStatus,
    /// Upload time.
    pub uploaded_at: DateTime<Utc>,
    /// Username of the reviewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    /// Review time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Review notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Fields supplied when uploading a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    /// The owning patient's `id`.
    pub patient_id: String,
    /// The owning patient's current name.
    pub patient_name: String,
    /// Imaging modality.
    pub scan_type: ScanType,
    /// Opaque encoded image payload.
    pub image_data: String,
    /// Initial status, `Pending` unless the caller says otherwise.
    pub status: ScanStatus,
}

impl NewScan {
    /// Create an upload for the given patient, copying its name.
    #[must_use]
    pub fn for_patient(
        patient: &Patient,
        scan_type: ScanType,
        image_data: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            scan_type,
            image_data: image_data.into(),
            status: ScanStatus::Pending,
        }
    }

    /// Override the initial status.
    #[must_use]
    pub fn with_status(mut self, status: ScanStatus) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn into_scan(self, id: String, uploaded_at: DateTime<Utc>) -> Scan {
        Scan {
            id,
            patient_id: self.patient_id,
            patient_name: self.patient_name,
            scan_type: self.scan_type,
            image_data: self.image_data,
            status: self.status,
            uploaded_at,
            reviewed_by: None,
            reviewed_at: None,
            notes: None,
        }
    }
}

/// Shallow patch over a scan. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPatch {
    /// New status.
    pub status: Option<ScanStatus>,
    /// Reviewer username.
    pub reviewed_by: Option<String>,
    /// Review time.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Review notes.
    pub notes: Option<String>,
    /// Corrected modality.
    pub scan_type: Option<ScanType>,
    /// Replacement image payload.
    pub image_data: Option<String>,
}

impl ScanPatch {
    /// A status-only override that leaves review metadata alone.
    #[must_use]
    pub fn status(status: ScanStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, scan: &mut Scan) {
        if let Some(status) = self.status {
            scan.status = status;
        }
        if self.reviewed_by.is_some() {
            scan.reviewed_by = self.reviewed_by;
        }
        if self.reviewed_at.is_some() {
            scan.reviewed_at = self.reviewed_at;
        }
        if self.notes.is_some() {
            scan.notes = self.notes;
        }
        if let Some(scan_type) = self.scan_type {
            scan.scan_type = scan_type;
        }
        if let Some(image_data) = self.image_data {
            scan.image_data = image_data;
        }
    }
}

/// A login account. Both roles share this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    /// Store-generated key.
    pub id: String,
    /// Unique, case-sensitive login name.
    pub username: String,
    /// Password digest, see [`crate::credential`].
    #[serde(rename = "password")]
    pub password_digest: String,
    /// Account role.
    pub role: Role,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Username of the creator, `System` for seeded accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Shallow patch over an account.
///
/// `password` is plaintext; the store hashes it before persisting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminPatch {
    /// New username.
    pub username: Option<String>,
    /// New plaintext password.
    pub password: Option<String>,
    /// New role.
    pub role: Option<Role>,
}

/// The currently authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The account `id`.
    pub id: String,
    /// The account username.
    pub username: String,
    /// The account role.
    pub role: Role,
}

impl Session {
    /// Build a session for an authenticated account.
    #[must_use]
    pub fn for_account(admin: &Admin) -> Self {
        Self {
            id: admin.id.clone(),
            username: admin.username.clone(),
            role: admin.role,
        }
    }

    /// Check if this session holds the given role.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Fail with [`Error::Forbidden`] unless this session holds `role`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session's role differs.
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(Error::Forbidden { required: role })
        }
    }
}
