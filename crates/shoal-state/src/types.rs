//! Persisted types owned by the state store.

use serde::{Deserialize, Serialize};

pub use shoal_core::types::*;

/// Sequence used for scaling-group ids.
pub const GROUP_SEQUENCE: &str = "group";

/// Sequence used for sandbox instance ids.
pub const SANDBOX_INSTANCE_SEQUENCE: &str = "sandbox_instance";

/// Sequence used for sandbox snapshot ids.
pub const SANDBOX_SNAPSHOT_SEQUENCE: &str = "sandbox_snapshot";

/// An instance held by the sandbox provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxInstance {
    pub id: u64,
    pub name: String,
    pub region: String,
    pub size: String,
    pub image_id: String,
    pub tags: Vec<String>,
    /// Unix timestamp (milliseconds) when the instance was created.
    pub created_at_ms: u64,
}

impl SandboxInstance {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
