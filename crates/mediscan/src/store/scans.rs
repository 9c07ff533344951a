//! Scan uploads and review dispositions.

use chrono::Utc;
use tracing::{debug, info};

use super::{next_id, RecordStore};
use crate::error::{Error, Result};
use crate::records::{NewScan, Role, Scan, ScanPatch, ScanStatus, Session};
use crate::storage::StoreKey;

impl RecordStore {
    /// All scans in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn list_scans(&self) -> Result<Vec<Scan>> {
        self.storage.get_list(StoreKey::Scans)
    }

    /// Look up a scan by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn find_scan(&self, id: &str) -> Result<Option<Scan>> {
        Ok(self.list_scans()?.into_iter().find(|s| s.id == id))
    }

    /// Scans of one patient, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn scans_for_patient(&self, patient_id: &str) -> Result<Vec<Scan>> {
        Ok(self
            .list_scans()?
            .into_iter()
            .filter(|s| s.patient_id == patient_id)
            .collect())
    }

    /// Store an uploaded scan, assigning `id` and `uploadedAt`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn create_scan(&self, new: NewScan) -> Result<Scan> {
        let mut scans = self.list_scans()?;
        let id = next_id("SCAN", |id| scans.iter().any(|s| s.id == id));
        let scan = new.into_scan(id, Utc::now());
        scans.push(scan.clone());
        self.storage.put(StoreKey::Scans, &scans)?;

        info!(
            "Uploaded {} scan {} for {}",
            scan.scan_type, scan.id, scan.patient_id
        );
        Ok(scan)
    }

    /// Apply `patch` to the scan `id`. Returns `None` if no such scan.
    ///
    /// Status changes are not checked against any transition order.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn update_scan(&self, id: &str, patch: ScanPatch) -> Result<Option<Scan>> {
        let mut scans = self.list_scans()?;
        let Some(scan) = scans.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        patch.apply(scan);
        let updated = scan.clone();
        self.storage.put(StoreKey::Scans, &scans)?;

        debug!("Updated scan {} ({})", updated.id, updated.status);
        Ok(Some(updated))
    }

    /// Submit a review: sets the status, the reviewer from `session`, the
    /// review time, and the notes together.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn review_scan(
        &self,
        id: &str,
        session: &Session,
        status: ScanStatus,
        notes: Option<String>,
    ) -> Result<Option<Scan>> {
        let patch = ScanPatch {
            status: Some(status),
            reviewed_by: Some(session.username.clone()),
            reviewed_at: Some(Utc::now()),
            notes,
            ..ScanPatch::default()
        };
        self.update_scan(id, patch)
    }

    /// Submit a review on behalf of `session`, enforcing the review rules:
    /// the reviewer must be a Doctor, the scan must still be `Pending`, and
    /// the outcome must not be `Pending`. Blank notes are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] for a non-Doctor session,
    /// [`Error::Validation`] for a `Pending` outcome or an already reviewed
    /// scan, [`Error::NotFound`] for an unknown scan, or an error if the
    /// read or write fails.
    pub fn submit_review(
        &self,
        session: &Session,
        id: &str,
        status: ScanStatus,
        notes: Option<String>,
    ) -> Result<Scan> {
        session.require_role(Role::Doctor)?;
        if status == ScanStatus::Pending {
            return Err(Error::validation(
                "review outcome must be Reviewed or Requires Follow-up",
            ));
        }

        let scan = self
            .find_scan(id)?
            .ok_or_else(|| Error::not_found("scan", id))?;
        if scan.status != ScanStatus::Pending {
            return Err(Error::validation(format!(
                "scan {id} is already {}",
                scan.status
            )));
        }

        let notes = notes.filter(|n| !n.trim().is_empty());
        self.review_scan(id, session, status, notes)?
            .ok_or_else(|| Error::not_found("scan", id))
    }

    /// Override only the status, leaving review metadata untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_scan_status(&self, id: &str, status: ScanStatus) -> Result<Option<Scan>> {
        self.update_scan(id, ScanPatch::status(status))
    }

    /// Scans whose patient name or scan type contains `term` (ignoring case),
    /// optionally restricted to one status.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn filter_scans(&self, term: &str, status: Option<ScanStatus>) -> Result<Vec<Scan>> {
        let needle = term.to_lowercase();
        Ok(self
            .list_scans()?
            .into_iter()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .filter(|s| {
                s.patient_name.to_lowercase().contains(&needle)
                    || s.scan_type.to_string().to_lowercase().contains(&needle)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{NewPatient, Patient, ScanType};
    use crate::store::tests::create_test_store;

    fn register(store: &RecordStore, name: &str, code: &str) -> Patient {
        store
            .create_patient(NewPatient::new(name, 40, code, "555-0100"))
            .unwrap()
    }

    fn doctor() -> Session {
        Session {
            id: "ADMIN-2".to_string(),
            username: "doctor".to_string(),
            role: Role::Doctor,
        }
    }

    #[test]
    fn test_create_scan_defaults() {
        let store = create_test_store();
        let patient = register(&store, "Jane Doe", "P-00001");

        let scan = store
            .create_scan(NewScan::for_patient(&patient, ScanType::Ct, "blob"))
            .unwrap();

        assert!(scan.id.starts_with("SCAN-"));
        assert_eq!(scan.status, ScanStatus::Pending);
        assert_eq!(scan.patient_name, "Jane Doe");
        assert!(scan.reviewed_by.is_none());
        assert!(scan.reviewed_at.is_none());
    }

    #[test]
    fn test_create_scan_keeps_caller_status() {
        let store = create_test_store();
        let patient = register(&store, "Jane Doe", "P-00001");

        let scan = store
            .create_scan(
                NewScan::for_patient(&patient, ScanType::XRay, "blob")
                    .with_status(ScanStatus::Reviewed),
            )
            .unwrap();
        assert_eq!(scan.status, ScanStatus::Reviewed);
    }

    #[test]
    fn test_scans_for_patient_in_insertion_order() {
        let store = create_test_store();
        let jane = register(&store, "Jane Doe", "P-00001");
        let john = register(&store, "John Roe", "P-00002");

        let first = store
            .create_scan(NewScan::for_patient(&jane, ScanType::Ct, "1"))
            .unwrap();
        store
            .create_scan(NewScan::for_patient(&john, ScanType::Ct, "2"))
            .unwrap();
        let third = store
            .create_scan(NewScan::for_patient(&jane, ScanType::XRay, "3"))
            .unwrap();

        let ids: Vec<String> = store
            .scans_for_patient(&jane.id)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![first.id, third.id]);
        assert!(store.scans_for_patient("PAT-0").unwrap().is_empty());
    }

    #[test]
    fn test_review_scenario() {
        let store = create_test_store();
        let jane = register(&store, "Jane Doe", "P-00001");
        let scan = store
            .create_scan(NewScan::for_patient(&jane, ScanType::Ct, "<blob>"))
            .unwrap();

        store
            .review_scan(
                &scan.id,
                &doctor(),
                ScanStatus::Reviewed,
                Some("clear".to_string()),
            )
            .unwrap()
            .unwrap();

        let scans = store.scans_for_patient(&jane.id).unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].status, ScanStatus::Reviewed);
        assert_eq!(scans[0].notes.as_deref(), Some("clear"));
        assert_eq!(scans[0].reviewed_by.as_deref(), Some("doctor"));
        assert!(scans[0].reviewed_at.is_some());
    }

    #[test]
    fn test_set_status_leaves_review_metadata() {
        let store = create_test_store();
        let jane = register(&store, "Jane Doe", "P-00001");
        let scan = store
            .create_scan(NewScan::for_patient(&jane, ScanType::Ct, "blob"))
            .unwrap();
        let reviewed = store
            .review_scan(&scan.id, &doctor(), ScanStatus::Reviewed, Some("ok".into()))
            .unwrap()
            .unwrap();

        let overridden = store
            .set_scan_status(&scan.id, ScanStatus::Pending)
            .unwrap()
            .unwrap();

        assert_eq!(overridden.status, ScanStatus::Pending);
        assert_eq!(overridden.reviewed_by, reviewed.reviewed_by);
        assert_eq!(overridden.reviewed_at, reviewed.reviewed_at);
        assert_eq!(overridden.notes, reviewed.notes);
    }

    #[test]
    fn test_any_status_transition_allowed() {
        let store = create_test_store();
        let jane = register(&store, "Jane Doe", "P-00001");
        let scan = store
            .create_scan(NewScan::for_patient(&jane, ScanType::Ct, "blob"))
            .unwrap();

        for status in [
            ScanStatus::RequiresFollowUp,
            ScanStatus::Reviewed,
            ScanStatus::Pending,
            ScanStatus::RequiresFollowUp,
        ] {
            let updated = store.set_scan_status(&scan.id, status).unwrap().unwrap();
            assert_eq!(updated.status, status);
        }
    }

    #[test]
    fn test_update_missing_scan() {
        let store = create_test_store();
        assert!(store
            .set_scan_status("SCAN-0", ScanStatus::Reviewed)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_filter_scans() {
        let store = create_test_store();
        let jane = register(&store, "Jane Doe", "P-00001");
        let john = register(&store, "John Roe", "P-00002");
        let ct = store
            .create_scan(NewScan::for_patient(&jane, ScanType::Ct, "1"))
            .unwrap();
        store
            .create_scan(NewScan::for_patient(&john, ScanType::XRay, "2"))
            .unwrap();
        store.set_scan_status(&ct.id, ScanStatus::Reviewed).unwrap();

        assert_eq!(store.filter_scans("", None).unwrap().len(), 2);
        assert_eq!(store.filter_scans("x-ray", None).unwrap().len(), 1);
        assert_eq!(store.filter_scans("JANE", None).unwrap().len(), 1);
        assert_eq!(
            store
                .filter_scans("", Some(ScanStatus::Pending))
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .filter_scans("jane", Some(ScanStatus::Pending))
            .unwrap()
            .is_empty());
    }

    fn pending_scan(store: &RecordStore) -> Scan {
        let jane = register(store, "Jane Doe", "P-00001");
        store
            .create_scan(NewScan::for_patient(&jane, ScanType::Ct, "blob"))
            .unwrap()
    }

    #[test]
    fn test_submit_review() {
        let store = create_test_store();
        let scan = pending_scan(&store);

        let reviewed = store
            .submit_review(
                &doctor(),
                &scan.id,
                ScanStatus::RequiresFollowUp,
                Some("repeat in 6 weeks".to_string()),
            )
            .unwrap();

        assert_eq!(reviewed.status, ScanStatus::RequiresFollowUp);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("doctor"));
        assert_eq!(reviewed.notes.as_deref(), Some("repeat in 6 weeks"));
    }

    #[test]
    fn test_submit_review_requires_doctor() {
        let store = create_test_store();
        let scan = pending_scan(&store);
        let admin = Session {
            id: "ADMIN-1".to_string(),
            username: "admin".to_string(),
            role: Role::Admin,
        };

        let err = store
            .submit_review(&admin, &scan.id, ScanStatus::Reviewed, None)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Forbidden {
                required: Role::Doctor
            }
        ));
        assert_eq!(store.find_scan(&scan.id).unwrap().unwrap(), scan);
    }

    #[test]
    fn test_submit_review_rejects_pending_outcome() {
        let store = create_test_store();
        let scan = pending_scan(&store);

        let err = store
            .submit_review(&doctor(), &scan.id, ScanStatus::Pending, None)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.find_scan(&scan.id).unwrap().unwrap().reviewed_by.is_none());
    }

    #[test]
    fn test_submit_review_rejects_reviewed_scan() {
        let store = create_test_store();
        let scan = pending_scan(&store);
        store
            .submit_review(&doctor(), &scan.id, ScanStatus::Reviewed, None)
            .unwrap();

        let err = store
            .submit_review(&doctor(), &scan.id, ScanStatus::RequiresFollowUp, None)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("already Reviewed"));
        assert_eq!(
            store.find_scan(&scan.id).unwrap().unwrap().status,
            ScanStatus::Reviewed
        );
    }

    #[test]
    fn test_submit_review_unknown_scan() {
        let store = create_test_store();
        let err = store
            .submit_review(&doctor(), "SCAN-0", ScanStatus::Reviewed, None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "scan", .. }));
    }

    #[test]
    fn test_submit_review_drops_blank_notes() {
        let store = create_test_store();
        let scan = pending_scan(&store);

        let reviewed = store
            .submit_review(
                &doctor(),
                &scan.id,
                ScanStatus::Reviewed,
                Some("   ".to_string()),
            )
            .unwrap();
        assert!(reviewed.notes.is_none());
    }
}
