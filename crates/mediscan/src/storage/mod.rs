//! Storage layer for mediscan.
//!
//! This module provides the `SQLite`-backed key-value substrate that the
//! record store serializes its collections into. Values are JSON documents
//! addressed by the fixed keys in [`StoreKey`]. A missing key reads as
//! absent; multi-key writes go through a [`Batch`] committed in one
//! transaction.

pub mod migrations;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The fixed keys of the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// The account collection.
    Admins,
    /// The patient collection.
    Patients,
    /// The scan collection.
    Scans,
    /// The current session slot.
    CurrentUser,
}

impl StoreKey {
    /// Every key, in layout order.
    pub const ALL: [Self; 4] = [
        Self::Admins,
        Self::Patients,
        Self::Scans,
        Self::CurrentUser,
    ];

    /// The persisted key string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admins => "admins",
            Self::Patients => "patients",
            Self::Scans => "scans",
            Self::CurrentUser => "currentUser",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteOp {
    Put(StoreKey, String),
    Remove(StoreKey),
}

/// A set of writes applied together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<WriteOp>,
}

impl Batch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON-encoded write of `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn put<T: Serialize + ?Sized>(mut self, key: StoreKey, value: &T) -> Result<Self> {
        self.ops.push(WriteOp::Put(key, serde_json::to_string(value)?));
        Ok(self)
    }

    /// Queue removal of `key`.
    #[must_use]
    pub fn remove(mut self, key: StoreKey) -> Self {
        self.ops.push(WriteOp::Remove(key));
        self
    }

    /// Number of queued writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if the batch has no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Key-value storage engine.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw JSON stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_raw(&self, key: StoreKey) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                [key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Read and decode the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptRecord`] if the stored JSON does not decode
    /// as `T`, or an error if the database operation fails.
    pub fn get<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| Error::CorruptRecord {
                    key: key.as_str(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Read a collection; a missing key is an empty collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is corrupt or the database operation fails.
    pub fn get_list<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Vec<T>> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    /// Encode and store a single value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database operation fails.
    pub fn put<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> Result<()> {
        self.commit(Batch::new().put(key, value)?)
    }

    /// Remove a key. Returns `true` if it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, key: StoreKey) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM records WHERE key = ?1", [key.as_str()])?;
        Ok(affected > 0)
    }

    /// Apply every write in `batch` inside one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; none of the batch is applied then.
    pub fn commit(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        for op in &batch.ops {
            match op {
                WriteOp::Put(key, value) => {
                    tx.execute(
                        r"
                        INSERT INTO records (key, value, updated_at)
                        VALUES (?1, ?2, datetime('now'))
                        ON CONFLICT(key) DO UPDATE SET
                            value = excluded.value,
                            updated_at = excluded.updated_at
                        ",
                        params![key.as_str(), value],
                    )?;
                }
                WriteOp::Remove(key) => {
                    tx.execute("DELETE FROM records WHERE key = ?1", [key.as_str()])?;
                }
            }
        }
        tx.commit()?;

        debug!("Committed batch of {} writes", batch.len());
        Ok(())
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let present_keys: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;

        let stored_bytes: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(value)), 0) FROM records",
            [],
            |row| row.get(0),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            present_keys,
            stored_bytes,
            db_size_bytes,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently holding a value.
    pub present_keys: i64,
    /// Total length of the stored JSON values.
    pub stored_bytes: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_key_strings() {
        let keys: Vec<&str> = StoreKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["admins", "patients", "scans", "currentUser"]);
        assert_eq!(StoreKey::CurrentUser.to_string(), "currentUser");
    }

    #[test]
    fn test_missing_key_reads_empty() {
        let storage = create_test_storage();
        assert!(storage.get_raw(StoreKey::Patients).unwrap().is_none());
        let list: Vec<String> = storage.get_list(StoreKey::Patients).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_put_and_get() {
        let storage = create_test_storage();
        storage.put(StoreKey::Scans, &vec!["a", "b"]).unwrap();

        let list: Vec<String> = storage.get_list(StoreKey::Scans).unwrap();
        assert_eq!(list, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(storage.get_raw(StoreKey::Scans).unwrap().unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_put_overwrites() {
        let storage = create_test_storage();
        storage.put(StoreKey::Admins, &vec![1]).unwrap();
        storage.put(StoreKey::Admins, &vec![2, 3]).unwrap();

        let list: Vec<i32> = storage.get_list(StoreKey::Admins).unwrap();
        assert_eq!(list, vec![2, 3]);
    }

    #[test]
    fn test_remove() {
        let storage = create_test_storage();
        storage.put(StoreKey::CurrentUser, "x").unwrap();

        assert!(storage.remove(StoreKey::CurrentUser).unwrap());
        assert!(!storage.remove(StoreKey::CurrentUser).unwrap());
        assert!(storage.get_raw(StoreKey::CurrentUser).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_value() {
        let storage = create_test_storage();
        storage
            .conn
            .execute(
                "INSERT INTO records (key, value) VALUES ('patients', 'not json')",
                [],
            )
            .unwrap();

        let err = storage.get_list::<i32>(StoreKey::Patients).unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { key: "patients", .. }));
    }

    #[test]
    fn test_batch_applies_all_writes() {
        let storage = create_test_storage();
        storage.put(StoreKey::CurrentUser, "someone").unwrap();

        let batch = Batch::new()
            .put(StoreKey::Patients, &vec![1])
            .unwrap()
            .put(StoreKey::Scans, &vec![2])
            .unwrap()
            .remove(StoreKey::CurrentUser);
        assert_eq!(batch.len(), 3);
        storage.commit(batch).unwrap();

        assert_eq!(storage.get_list::<i32>(StoreKey::Patients).unwrap(), vec![1]);
        assert_eq!(storage.get_list::<i32>(StoreKey::Scans).unwrap(), vec![2]);
        assert!(storage.get_raw(StoreKey::CurrentUser).unwrap().is_none());
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let storage = create_test_storage();
        storage.put(StoreKey::Patients, &vec![1]).unwrap();
        // Reject any write to the scans key so the second write fails.
        storage
            .conn
            .execute_batch(
                r"
                CREATE TRIGGER reject_scans BEFORE INSERT ON records
                WHEN NEW.key = 'scans'
                BEGIN SELECT RAISE(ABORT, 'scans locked'); END;
                ",
            )
            .unwrap();

        let batch = Batch::new()
            .put(StoreKey::Patients, &vec![9])
            .unwrap()
            .put(StoreKey::Scans, &vec![9])
            .unwrap();
        assert!(storage.commit(batch).is_err());

        assert_eq!(storage.get_list::<i32>(StoreKey::Patients).unwrap(), vec![1]);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let storage = create_test_storage();
        assert!(Batch::new().is_empty());
        storage.commit(Batch::new()).unwrap();
        assert_eq!(storage.stats().unwrap().present_keys, 0);
    }

    #[test]
    fn test_stats() {
        let storage = create_test_storage();
        storage.put(StoreKey::Admins, &vec![1, 2]).unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.present_keys, 1);
        assert_eq!(stats.stored_bytes, 5);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_path() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_open_file_based() {
        let db_path = std::env::temp_dir().join(format!("mediscan_test_{}.db", std::process::id()));

        {
            let storage = Storage::open(&db_path).unwrap();
            storage.put(StoreKey::Patients, &vec!["kept"]).unwrap();
            assert_eq!(storage.path(), db_path);
            assert!(storage.stats().unwrap().db_size_bytes > 0);
        }

        let reopened = Storage::open(&db_path).unwrap();
        let list: Vec<String> = reopened.get_list(StoreKey::Patients).unwrap();
        assert_eq!(list, vec!["kept".to_string()]);

        drop(reopened);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("mediscan_nested_{}", std::process::id()));
        let nested_path = root.join("nested/records.db");
        let _ = std::fs::remove_dir_all(&root);

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }
}
