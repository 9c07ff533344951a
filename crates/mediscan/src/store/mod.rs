//! The local record store.
//!
//! [`RecordStore`] owns the canonical account, patient and scan collections
//! and the current-session slot. Each operation reads the collection it needs
//! from [`Storage`], applies the domain rule, and writes the result back.
//! Callers re-read after a mutation; nothing is cached here.

mod accounts;
mod patients;
mod scans;

pub use patients::format_patient_code;

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::credential::hash_password;
use crate::error::{Error, Result};
use crate::records::{Admin, Role, Session};
use crate::storage::{Batch, Storage, StoreKey};

/// Username of the seeded administrative account.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
/// Password of the seeded administrative account.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
/// Username of the seeded clinical account.
pub const DEFAULT_DOCTOR_USERNAME: &str = "doctor";
/// Password of the seeded clinical account.
pub const DEFAULT_DOCTOR_PASSWORD: &str = "doctor123";
/// `createdBy` value of seeded accounts.
pub const SEED_CREATOR: &str = "System";

/// Role-gated record store over a [`Storage`] substrate.
#[derive(Debug)]
pub struct RecordStore {
    storage: Storage,
}

impl RecordStore {
    /// Wrap an opened storage engine.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Open the store backed by the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Storage::open(path).map(Self::new)
    }

    /// Open an empty in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Storage::open_in_memory().map(Self::new)
    }

    /// The underlying storage engine.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Record `session` as the logged-in actor, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_current_user(&self, session: &Session) -> Result<()> {
        self.storage.put(StoreKey::CurrentUser, session)?;
        debug!("Session set for {} ({})", session.username, session.role);
        Ok(())
    }

    /// The logged-in actor, if any.
    ///
    /// A stored session that does not decode (unknown role, missing field)
    /// is logged and treated as no session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn current_user(&self) -> Result<Option<Session>> {
        let Some(raw) = self.storage.get_raw(StoreKey::CurrentUser)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("Ignoring malformed stored session: {}", e);
                Ok(None)
            }
        }
    }

    /// The logged-in actor, or [`Error::NotLoggedIn`].
    ///
    /// # Errors
    ///
    /// Returns an error if no session is stored or the read fails.
    pub fn require_session(&self) -> Result<Session> {
        self.current_user()?.ok_or(Error::NotLoggedIn)
    }

    /// The logged-in actor, provided it holds `role`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoggedIn`] without a session,
    /// [`Error::Forbidden`] if the session holds another role, or an error if
    /// the read fails.
    pub fn require_role(&self, role: Role) -> Result<Session> {
        let session = self.require_session()?;
        session.require_role(role)?;
        Ok(session)
    }

    /// Log out.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn clear_current_user(&self) -> Result<()> {
        if self.storage.remove(StoreKey::CurrentUser)? {
            debug!("Session cleared");
        }
        Ok(())
    }

    /// Erase every collection and the session, then seed the default
    /// `admin` and `doctor` accounts. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the store is unchanged then.
    pub fn reset_all(&self) -> Result<()> {
        let batch = Batch::new()
            .remove(StoreKey::Patients)
            .remove(StoreKey::Scans)
            .remove(StoreKey::CurrentUser)
            .put(StoreKey::Admins, &default_accounts())?;
        self.storage.commit(batch)?;

        info!("All records reset to the default accounts");
        Ok(())
    }

    /// Seed the default accounts if no account exists yet.
    ///
    /// Returns `true` if accounts were seeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub fn ensure_default_accounts(&self) -> Result<bool> {
        if !self.list_admins()?.is_empty() {
            return Ok(false);
        }
        self.storage.put(StoreKey::Admins, &default_accounts())?;
        info!("Seeded default accounts");
        Ok(true)
    }
}

fn default_accounts() -> Vec<Admin> {
    let mut accounts: Vec<Admin> = Vec::with_capacity(2);
    for (username, password, role) in [
        (DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD, Role::Admin),
        (DEFAULT_DOCTOR_USERNAME, DEFAULT_DOCTOR_PASSWORD, Role::Doctor),
    ] {
        let id = next_id("ADMIN", |id| accounts.iter().any(|a| a.id == id));
        accounts.push(Admin {
            id,
            username: username.to_string(),
            password_digest: hash_password(password),
            role,
            created_at: Utc::now(),
            created_by: Some(SEED_CREATOR.to_string()),
        });
    }
    accounts
}

/// Generate `<prefix>-<millis>`, stepping forward past ids already taken.
pub(crate) fn next_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut millis = Utc::now().timestamp_millis();
    loop {
        let id = format!("{prefix}-{millis}");
        if !taken(&id) {
            return id;
        }
        millis += 1;
    }
}
