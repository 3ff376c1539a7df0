//! redb table definitions for the Shoal state store.

use redb::TableDefinition;

/// Group records keyed by group name.
pub const GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("groups");

/// Monotonic id counters keyed by sequence name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Sandbox provider instances keyed by numeric instance id.
pub const SANDBOX_INSTANCES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("sandbox_instances");

/// Sandbox provider snapshots: snapshot name → snapshot id.
pub const SANDBOX_SNAPSHOTS: TableDefinition<&str, &str> =
    TableDefinition::new("sandbox_snapshots");
