//! Dashboard statistics and scan report export.
//!
//! The exported report is a one-way JSON snapshot of the counts and the
//! scans it covers. Nothing reads it back.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::records::{Scan, ScanStatus};
use crate::store::RecordStore;

/// Headline counts for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Registered patients.
    pub total_patients: usize,
    /// Uploaded scans.
    pub total_scans: usize,
    /// Scans still `Pending`.
    pub pending_scans: usize,
    /// Scans marked `Reviewed`.
    pub reviewed_scans: usize,
}

/// Snapshot of a set of scans with per-status counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
    /// Number of scans covered.
    pub total_scans: usize,
    /// Scans marked `Reviewed`.
    pub completed_scans: usize,
    /// Scans still `Pending`.
    pub pending_scans: usize,
    /// Scans marked `Requires Follow-up`.
    pub follow_up_scans: usize,
    /// The scans themselves.
    pub scans: Vec<Scan>,
}

fn count_status(scans: &[Scan], status: ScanStatus) -> usize {
    scans.iter().filter(|s| s.status == status).count()
}

impl ScanReport {
    /// Build a report over `scans`.
    #[must_use]
    pub fn new(scans: Vec<Scan>) -> Self {
        Self {
            generated_at: Utc::now(),
            total_scans: scans.len(),
            completed_scans: count_status(&scans, ScanStatus::Reviewed),
            pending_scans: count_status(&scans, ScanStatus::Pending),
            follow_up_scans: count_status(&scans, ScanStatus::RequiresFollowUp),
            scans,
        }
    }

    /// Default export file name for a report taken on `date`.
    #[must_use]
    pub fn default_file_name(date: NaiveDate) -> String {
        format!("medical-scans-report-{}.json", date.format("%Y-%m-%d"))
    }

    /// Write the report as pretty-printed JSON.
    ///
    /// `path` names a directory if it already is one or if it ends with a
    /// path separator; the default file name is used inside it then. Any
    /// other path is the file to write. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if path.is_dir() || ends_with_separator(path) {
            return self.export_into(path);
        }

        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        self.write_to(path)
    }

    /// Write the report under its default file name inside `dir`, creating
    /// the directory if needed. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the write fails.
    pub fn export_into(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        create_dir(dir)?;
        self.write_to(&dir.join(Self::default_file_name(self.generated_at.date_naive())))
    }

    fn write_to(&self, target: &Path) -> Result<PathBuf> {
        std::fs::write(target, serde_json::to_string_pretty(self)?)?;
        info!(
            "Exported report of {} scans to {}",
            self.total_scans,
            target.display()
        );
        Ok(target.to_path_buf())
    }
}

fn ends_with_separator(path: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .ends_with(std::path::is_separator)
}

fn create_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })
}

impl RecordStore {
    /// Headline counts across all collections.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be read.
    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let scans = self.list_scans()?;
        Ok(DashboardStats {
            total_patients: self.list_patients()?.len(),
            total_scans: scans.len(),
            pending_scans: count_status(&scans, ScanStatus::Pending),
            reviewed_scans: count_status(&scans, ScanStatus::Reviewed),
        })
    }

    /// Report over all scans, or over one patient's scans.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn scan_report(&self, patient_id: Option<&str>) -> Result<ScanReport> {
        let scans = match patient_id {
            Some(id) => self.scans_for_patient(id)?,
            None => self.list_scans()?,
        };
        Ok(ScanReport::new(scans))
    }
}
