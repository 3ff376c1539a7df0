//! StateStore: redb-backed state persistence for Shoal.
//!
//! Provides typed CRUD operations over group records, id sequences, and the
//! sandbox provider's instances and snapshots. Values are JSON-serialized
//! into redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(GROUPS).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.open_table(SANDBOX_INSTANCES).map_err(map_err!(Table))?;
        txn.open_table(SANDBOX_SNAPSHOTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Sequences ──────────────────────────────────────────────────

    /// Allocate the next value of a named sequence (first value is 1).
    pub fn next_id(&self, sequence: &str) -> StateResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let next = bump_sequence(&txn, sequence)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%sequence, next, "sequence advanced");
        Ok(next)
    }

    // ── Groups ─────────────────────────────────────────────────────

    /// Insert a new group record. Fails with `Conflict` if the name is taken.
    pub fn insert_group(&self, record: &GroupRecord) -> StateResult<()> {
        let key = record.table_key();
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(GROUPS).map_err(map_err!(Table))?;
            if table.get(key).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::Conflict(format!("group {key}")));
            }
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, id = record.id, "group inserted");
        Ok(())
    }

    /// Overwrite an existing group record. Fails with `NotFound` if absent.
    pub fn update_group(&self, record: &GroupRecord) -> StateResult<()> {
        let key = record.table_key();
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(GROUPS).map_err(map_err!(Table))?;
            if table.get(key).map_err(map_err!(Read))?.is_none() {
                return Err(StateError::NotFound(format!("group {key}")));
            }
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, desired = record.capacity.desired, "group updated");
        Ok(())
    }

    /// Get a group record by name.
    pub fn get_group(&self, name: &str) -> StateResult<Option<GroupRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(GROUPS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: GroupRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all group records, ordered by name.
    pub fn list_groups(&self) -> StateResult<Vec<GroupRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(GROUPS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: GroupRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Remove a group record by name. Returns true if it existed.
    pub fn remove_group(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(GROUPS).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%name, existed, "group removed");
        Ok(existed)
    }

    // ── Sandbox instances ──────────────────────────────────────────

    /// Allocate an id and store a new sandbox instance in one transaction.
    ///
    /// `build` receives the allocated id and returns the record to store.
    pub fn create_sandbox_instance<F>(&self, build: F) -> StateResult<SandboxInstance>
    where
        F: FnOnce(u64) -> SandboxInstance,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let id = bump_sequence(&txn, SANDBOX_INSTANCE_SEQUENCE)?;
        let instance = build(id);
        let value = serde_json::to_vec(&instance).map_err(map_err!(Serialize))?;
        {
            let mut table = txn.open_table(SANDBOX_INSTANCES).map_err(map_err!(Table))?;
            table
                .insert(instance.id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = instance.id, name = %instance.name, "sandbox instance stored");
        Ok(instance)
    }

    /// List every sandbox instance in id order.
    pub fn list_sandbox_instances(&self) -> StateResult<Vec<SandboxInstance>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SANDBOX_INSTANCES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let instance: SandboxInstance =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(instance);
        }
        Ok(results)
    }

    /// Delete a sandbox instance. Returns true if it existed.
    pub fn delete_sandbox_instance(&self, id: u64) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(SANDBOX_INSTANCES).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, existed, "sandbox instance deleted");
        Ok(existed)
    }

    // ── Sandbox snapshots ──────────────────────────────────────────

    /// Register a snapshot name, returning its id. Re-registering a known
    /// name returns the existing id.
    pub fn register_sandbox_snapshot(&self, name: &str) -> StateResult<String> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existing = {
            let table = txn.open_table(SANDBOX_SNAPSHOTS).map_err(map_err!(Table))?;
            let guard = table.get(name).map_err(map_err!(Read))?;
            guard.map(|g| g.value().to_string())
        };
        if let Some(id) = existing {
            return Ok(id);
        }
        let id = bump_sequence(&txn, SANDBOX_SNAPSHOT_SEQUENCE)?.to_string();
        {
            let mut table = txn.open_table(SANDBOX_SNAPSHOTS).map_err(map_err!(Table))?;
            table.insert(name, id.as_str()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%name, %id, "sandbox snapshot registered");
        Ok(id)
    }

    /// Look up a sandbox snapshot id by name.
    pub fn get_sandbox_snapshot(&self, name: &str) -> StateResult<Option<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SANDBOX_SNAPSHOTS).map_err(map_err!(Table))?;
        let guard = table.get(name).map_err(map_err!(Read))?;
        Ok(guard.map(|g| g.value().to_string()))
    }
}

/// Advance `sequence` inside an open write transaction.
fn bump_sequence(txn: &WriteTransaction, sequence: &str) -> StateResult<u64> {
    let mut table = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
    let current = table
        .get(sequence)
        .map_err(map_err!(Read))?
        .map(|g| g.value())
        .unwrap_or(0);
    let next = current + 1;
    table.insert(sequence, next).map_err(map_err!(Write))?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_group(id: u64, name: &str) -> GroupRecord {
        GroupRecord {
            id,
            name: name.to_string(),
            region: "nyc1".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            image: ImageRef {
                slug: "base".to_string(),
                provider_id: "1".to_string(),
            },
            tags: vec!["web".to_string()],
            capacity: Capacity::new(0, 2, 4).unwrap(),
            created_at: 1000,
            updated_at: 1000,
        }
    }

    fn sandbox_instance(id: u64, name: &str, tag: &str) -> SandboxInstance {
        SandboxInstance {
            id,
            name: name.to_string(),
            region: "nyc1".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            image_id: "1".to_string(),
            tags: vec![tag.to_string()],
            created_at_ms: 1_000_000,
        }
    }

    // ── Group CRUD ─────────────────────────────────────────────────

    #[test]
    fn group_insert_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_group(1, "web-a");

        store.insert_group(&record).unwrap();
        assert_eq!(store.get_group("web-a").unwrap(), Some(record));
    }

    #[test]
    fn group_insert_duplicate_name_conflicts() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_group(&test_group(1, "web-a")).unwrap();

        let err = store.insert_group(&test_group(2, "web-a")).unwrap_err();
        assert!(matches!(err, StateError::Conflict(_)));
        // The stored record is untouched.
        assert_eq!(store.get_group("web-a").unwrap().unwrap().id, 1);
    }

    #[test]
    fn group_update_in_place() {
        let store = StateStore::open_in_memory().unwrap();
        let mut record = test_group(1, "web-a");
        store.insert_group(&record).unwrap();

        record.capacity = record.capacity.with_desired(4).unwrap();
        record.updated_at = 2000;
        store.update_group(&record).unwrap();

        let retrieved = store.get_group("web-a").unwrap().unwrap();
        assert_eq!(retrieved.capacity.desired, 4);
        assert_eq!(retrieved.updated_at, 2000);
    }

    #[test]
    fn group_update_missing_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.update_group(&test_group(1, "ghost")).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
        assert!(store.get_group("ghost").unwrap().is_none());
    }

    #[test]
    fn group_list_is_ordered_by_name() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_group(&test_group(1, "web-b")).unwrap();
        store.insert_group(&test_group(2, "api-a")).unwrap();
        store.insert_group(&test_group(3, "web-a")).unwrap();

        let names: Vec<String> = store
            .list_groups()
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["api-a", "web-a", "web-b"]);
    }

    #[test]
    fn group_remove() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_group(&test_group(1, "web-a")).unwrap();

        assert!(store.remove_group("web-a").unwrap());
        assert!(!store.remove_group("web-a").unwrap());
        assert!(store.get_group("web-a").unwrap().is_none());
    }

    // ── Sequences ──────────────────────────────────────────────────

    #[test]
    fn sequences_are_independent_and_monotonic() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.next_id(GROUP_SEQUENCE).unwrap(), 1);
        assert_eq!(store.next_id(GROUP_SEQUENCE).unwrap(), 2);
        assert_eq!(store.next_id("other").unwrap(), 1);
        assert_eq!(store.next_id(GROUP_SEQUENCE).unwrap(), 3);
    }

    // ── Sandbox ────────────────────────────────────────────────────

    #[test]
    fn sandbox_instance_create_list_delete() {
        let store = StateStore::open_in_memory().unwrap();
        let a = store
            .create_sandbox_instance(|id| sandbox_instance(id, "g-0", "group:1"))
            .unwrap();
        let b = store
            .create_sandbox_instance(|id| sandbox_instance(id, "g-1", "group:1"))
            .unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let all = store.list_sandbox_instances().unwrap();
        assert_eq!(all, vec![a.clone(), b.clone()]);

        assert!(store.delete_sandbox_instance(a.id).unwrap());
        assert!(!store.delete_sandbox_instance(a.id).unwrap());
        assert_eq!(store.list_sandbox_instances().unwrap(), vec![b]);
    }

    #[test]
    fn sandbox_instance_ids_are_never_reused() {
        let store = StateStore::open_in_memory().unwrap();
        let a = store
            .create_sandbox_instance(|id| sandbox_instance(id, "g-0", "group:1"))
            .unwrap();
        store.delete_sandbox_instance(a.id).unwrap();
        let b = store
            .create_sandbox_instance(|id| sandbox_instance(id, "g-1", "group:1"))
            .unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn sandbox_snapshot_registration_is_idempotent() {
        let store = StateStore::open_in_memory().unwrap();
        let first = store.register_sandbox_snapshot("base").unwrap();
        let again = store.register_sandbox_snapshot("base").unwrap();
        let other = store.register_sandbox_snapshot("gpu").unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(store.get_sandbox_snapshot("base").unwrap(), Some(first));
        assert!(store.get_sandbox_snapshot("missing").unwrap().is_none());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.insert_group(&test_group(1, "web-a")).unwrap();
            store.next_id(GROUP_SEQUENCE).unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.get_group("web-a").unwrap().unwrap().id, 1);
        assert_eq!(store.next_id(GROUP_SEQUENCE).unwrap(), 2);
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_groups().unwrap().is_empty());
        assert!(store.list_sandbox_instances().unwrap().is_empty());
        assert!(store.get_group("nope").unwrap().is_none());
        assert!(!store.remove_group("nope").unwrap());
        assert!(!store.delete_sandbox_instance(99).unwrap());
    }
}
