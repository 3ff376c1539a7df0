//! Metadata store contract for scaling-group records.

use crate::error::{StateError, StateResult};
use crate::store::StateStore;
use crate::types::{GROUP_SEQUENCE, GroupId, GroupRecord};

/// Persistence for group records: identity, template and capacity only.
///
/// Implementations never store live instances or status.
pub trait GroupStore: Send + Sync {
    /// Allocate a fresh, never reused group id.
    fn next_group_id(&self) -> StateResult<GroupId>;

    /// Persist a new record. `Conflict` if the name already exists.
    fn create_group(&self, record: &GroupRecord) -> StateResult<()>;

    /// `NotFound` if no record carries `name`.
    fn get_group_by_name(&self, name: &str) -> StateResult<GroupRecord>;

    /// Overwrite an existing record. `NotFound` if it was deleted meanwhile.
    fn save_group(&self, record: &GroupRecord) -> StateResult<()>;

    /// Remove a record. `NotFound` if it is already gone.
    fn delete_group(&self, record: &GroupRecord) -> StateResult<()>;

    fn list_groups(&self) -> StateResult<Vec<GroupRecord>>;
}

impl GroupStore for StateStore {
    fn next_group_id(&self) -> StateResult<GroupId> {
        self.next_id(GROUP_SEQUENCE)
    }

    fn create_group(&self, record: &GroupRecord) -> StateResult<()> {
        self.insert_group(record)
    }

    fn get_group_by_name(&self, name: &str) -> StateResult<GroupRecord> {
        self.get_group(name)?
            .ok_or_else(|| StateError::NotFound(format!("group {name}")))
    }

    fn save_group(&self, record: &GroupRecord) -> StateResult<()> {
        self.update_group(record)
    }

    fn delete_group(&self, record: &GroupRecord) -> StateResult<()> {
        if self.remove_group(&record.name)? {
            Ok(())
        } else {
            Err(StateError::NotFound(format!("group {}", record.name)))
        }
    }

    fn list_groups(&self) -> StateResult<Vec<GroupRecord>> {
        StateStore::list_groups(self)
    }
}
