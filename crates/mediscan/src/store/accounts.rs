//! Account management and authentication.

use chrono::Utc;
use tracing::{debug, info};

use super::{next_id, RecordStore};
use crate::credential::{hash_password, verify_password};
use crate::error::{Error, Result};
use crate::records::{Admin, AdminPatch, Role, Session};
use crate::storage::StoreKey;

impl RecordStore {
    /// All accounts in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn list_admins(&self) -> Result<Vec<Admin>> {
        self.storage.get_list(StoreKey::Admins)
    }

    /// Look up an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn find_admin(&self, id: &str) -> Result<Option<Admin>> {
        Ok(self.list_admins()?.into_iter().find(|a| a.id == id))
    }

    /// Look up an account by exact, case-sensitive username.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        Ok(self
            .list_admins()?
            .into_iter()
            .find(|a| a.username == username))
    }

    /// Create an account with a hashed password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the username is taken, or an error if
    /// the write fails.
    pub fn create_admin(
        &self,
        username: &str,
        password: &str,
        role: Role,
        created_by: Option<&str>,
    ) -> Result<Admin> {
        let mut admins = self.list_admins()?;
        if admins.iter().any(|a| a.username == username) {
            return Err(Error::conflict("username", username));
        }

        let admin = Admin {
            id: next_id("ADMIN", |id| admins.iter().any(|a| a.id == id)),
            username: username.to_string(),
            password_digest: hash_password(password),
            role,
            created_at: Utc::now(),
            created_by: created_by.map(str::to_string),
        };
        admins.push(admin.clone());
        self.storage.put(StoreKey::Admins, &admins)?;

        info!("Created {} account {}", admin.role, admin.username);
        Ok(admin)
    }

    /// Apply `patch` to the account `id`. Returns `None` if no such account.
    ///
    /// A patched password is hashed before it is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the new username belongs to another
    /// account, or an error if the write fails.
    pub fn update_admin(&self, id: &str, patch: AdminPatch) -> Result<Option<Admin>> {
        let mut admins = self.list_admins()?;
        let Some(index) = admins.iter().position(|a| a.id == id) else {
            return Ok(None);
        };

        if let Some(username) = &patch.username {
            if admins.iter().any(|a| a.id != id && &a.username == username) {
                return Err(Error::conflict("username", username.as_str()));
            }
        }

        let admin = &mut admins[index];
        if let Some(username) = patch.username {
            admin.username = username;
        }
        if let Some(password) = patch.password {
            admin.password_digest = hash_password(&password);
        }
        if let Some(role) = patch.role {
            admin.role = role;
        }
        let updated = admin.clone();
        self.storage.put(StoreKey::Admins, &admins)?;

        debug!("Updated account {}", updated.id);
        Ok(Some(updated))
    }

    /// Delete the account `id`. Returns `false` if no such account.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete_admin(&self, id: &str) -> Result<bool> {
        let mut admins = self.list_admins()?;
        let before = admins.len();
        admins.retain(|a| a.id != id);
        if admins.len() == before {
            return Ok(false);
        }
        self.storage.put(StoreKey::Admins, &admins)?;

        info!("Deleted account {}", id);
        Ok(true)
    }

    /// Delete an account on behalf of `session`. Only an Admin may delete
    /// accounts, and never the account it is logged in as.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] for a non-Admin session,
    /// [`Error::Validation`] when `id` is the session's own account,
    /// [`Error::NotFound`] for an unknown id, or an error if the read or
    /// write fails.
    pub fn remove_account(&self, session: &Session, id: &str) -> Result<()> {
        session.require_role(Role::Admin)?;
        if session.id == id {
            return Err(Error::validation("cannot delete the logged-in account"));
        }
        if !self.delete_admin(id)? {
            return Err(Error::not_found("account", id));
        }
        Ok(())
    }

    /// Check a username and password.
    ///
    /// Does not start a session; pass the result to
    /// [`crate::records::Session::for_account`] and
    /// [`RecordStore::set_current_user`] for that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] for an unknown username and for a
    /// wrong password alike, or an error if the collection cannot be read.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Admin> {
        let Some(admin) = self.find_admin_by_username(username)? else {
            debug!("Authentication failed: unknown username");
            return Err(Error::InvalidCredentials);
        };
        if !verify_password(password, &admin.password_digest) {
            debug!("Authentication failed: password mismatch");
            return Err(Error::InvalidCredentials);
        }
        Ok(admin)
    }

    /// Replace the password of `id` after verifying `old_password`.
    ///
    /// Returns `false` if the account is missing or the old password is wrong.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub fn change_password(&self, id: &str, old_password: &str, new_password: &str) -> Result<bool> {
        let Some(admin) = self.find_admin(id)? else {
            return Ok(false);
        };
        if !verify_password(old_password, &admin.password_digest) {
            return Ok(false);
        }

        let patch = AdminPatch {
            password: Some(new_password.to_string()),
            ..AdminPatch::default()
        };
        Ok(self.update_admin(id, patch)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::create_test_store;

    #[test]
    fn test_create_hashes_password() {
        let store = create_test_store();
        let admin = store
            .create_admin("alice", "secret1", Role::Doctor, Some("admin"))
            .unwrap();

        assert!(admin.id.starts_with("ADMIN-"));
        assert_eq!(admin.password_digest, hash_password("secret1"));
        assert_ne!(admin.password_digest, "secret1");
        assert_eq!(admin.created_by.as_deref(), Some("admin"));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let store = create_test_store();
        for name in ["c", "a", "b"] {
            store.create_admin(name, "pw", Role::Doctor, None).unwrap();
        }

        let names: Vec<String> = store
            .list_admins()
            .unwrap()
            .into_iter()
            .map(|a| a.username)
            .collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn test_list_is_idempotent() {
        let store = create_test_store();
        store.create_admin("a", "pw", Role::Admin, None).unwrap();
        store.create_admin("b", "pw", Role::Doctor, None).unwrap();

        assert_eq!(store.list_admins().unwrap(), store.list_admins().unwrap());
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let store = create_test_store();
        store.create_admin("alice", "pw", Role::Doctor, None).unwrap();

        let err = store
            .create_admin("alice", "other", Role::Admin, None)
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.list_admins().unwrap().len(), 1);
    }

    #[test]
    fn test_username_is_case_sensitive() {
        let store = create_test_store();
        store.create_admin("alice", "pw", Role::Doctor, None).unwrap();
        assert!(store.create_admin("Alice", "pw", Role::Doctor, None).is_ok());
        assert!(store.find_admin_by_username("ALICE").unwrap().is_none());
    }

    #[test]
    fn test_update_merges_fields() {
        let store = create_test_store();
        let admin = store.create_admin("alice", "pw", Role::Doctor, None).unwrap();

        let updated = store
            .update_admin(
                &admin.id,
                AdminPatch {
                    role: Some(Role::Admin),
                    ..AdminPatch::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.username, "alice");
        assert_eq!(updated.id, admin.id);
        assert_eq!(updated.created_at, admin.created_at);
        assert_eq!(updated.password_digest, admin.password_digest);
    }

    #[test]
    fn test_update_rehashes_password() {
        let store = create_test_store();
        let admin = store.create_admin("alice", "old", Role::Doctor, None).unwrap();

        store
            .update_admin(
                &admin.id,
                AdminPatch {
                    password: Some("new-pass".to_string()),
                    ..AdminPatch::default()
                },
            )
            .unwrap();

        assert!(store.authenticate("alice", "new-pass").is_ok());
        assert!(store.authenticate("alice", "old").is_err());
    }

    #[test]
    fn test_update_missing_returns_none() {
        let store = create_test_store();
        assert!(store
            .update_admin("ADMIN-0", AdminPatch::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_rename_onto_taken_username_conflicts() {
        let store = create_test_store();
        store.create_admin("alice", "pw", Role::Doctor, None).unwrap();
        let bob = store.create_admin("bob", "pw", Role::Doctor, None).unwrap();

        let err = store
            .update_admin(
                &bob.id,
                AdminPatch {
                    username: Some("alice".to_string()),
                    ..AdminPatch::default()
                },
            )
            .unwrap_err();
        assert!(err.is_conflict());

        // Keeping one's own username is not a conflict.
        let same = AdminPatch {
            username: Some("bob".to_string()),
            ..AdminPatch::default()
        };
        assert!(store.update_admin(&bob.id, same).unwrap().is_some());
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        let admin = store.create_admin("alice", "pw", Role::Doctor, None).unwrap();
        store.create_admin("bob", "pw", Role::Doctor, None).unwrap();

        assert!(!store.delete_admin("ADMIN-0").unwrap());
        assert_eq!(store.list_admins().unwrap().len(), 2);

        assert!(store.delete_admin(&admin.id).unwrap());
        assert_eq!(store.list_admins().unwrap().len(), 1);
        assert!(store.find_admin(&admin.id).unwrap().is_none());
    }

    #[test]
    fn test_authenticate_failures_look_the_same() {
        let store = create_test_store();
        store.reset_all().unwrap();

        let admin = store.authenticate("admin", "admin123").unwrap();
        assert_eq!(admin.role, Role::Admin);

        let wrong_password = store.authenticate("admin", "wrong").unwrap_err();
        let unknown_user = store.authenticate("ghost", "x").unwrap_err();
        assert!(matches!(wrong_password, Error::InvalidCredentials));
        assert!(matches!(unknown_user, Error::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[test]
    fn test_authenticate_does_not_start_session() {
        let store = create_test_store();
        store.reset_all().unwrap();
        store.authenticate("admin", "admin123").unwrap();
        assert!(store.current_user().unwrap().is_none());
    }

    #[test]
    fn test_change_password() {
        let store = create_test_store();
        let admin = store.create_admin("alice", "first", Role::Doctor, None).unwrap();

        assert!(!store.change_password(&admin.id, "wrong", "second").unwrap());
        assert!(!store.change_password("ADMIN-0", "first", "second").unwrap());
        assert!(store.authenticate("alice", "first").is_ok());

        assert!(store.change_password(&admin.id, "first", "second").unwrap());
        assert!(store.authenticate("alice", "second").is_ok());
        assert!(store.authenticate("alice", "first").is_err());
    }

    #[test]
    fn test_remove_account() {
        let store = create_test_store();
        let admin = store.create_admin("root", "pw", Role::Admin, None).unwrap();
        let bob = store.create_admin("bob", "pw", Role::Doctor, None).unwrap();

        store
            .remove_account(&Session::for_account(&admin), &bob.id)
            .unwrap();
        assert!(store.find_admin(&bob.id).unwrap().is_none());
    }

    #[test]
    fn test_remove_account_requires_admin() {
        let store = create_test_store();
        let doctor = store.create_admin("doc", "pw", Role::Doctor, None).unwrap();
        let bob = store.create_admin("bob", "pw", Role::Doctor, None).unwrap();

        let err = store
            .remove_account(&Session::for_account(&doctor), &bob.id)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Forbidden {
                required: Role::Admin
            }
        ));
        assert!(store.find_admin(&bob.id).unwrap().is_some());
    }

    #[test]
    fn test_remove_account_refuses_self() {
        let store = create_test_store();
        let admin = store.create_admin("root", "pw", Role::Admin, None).unwrap();

        let err = store
            .remove_account(&Session::for_account(&admin), &admin.id)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.find_admin(&admin.id).unwrap().is_some());
    }

    #[test]
    fn test_remove_account_unknown_id() {
        let store = create_test_store();
        let admin = store.create_admin("root", "pw", Role::Admin, None).unwrap();

        let err = store
            .remove_account(&Session::for_account(&admin), "ADMIN-0")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "account", .. }));
    }
}
