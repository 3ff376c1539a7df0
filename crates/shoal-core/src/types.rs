//! Domain types for scaling groups and the instances that back them.
//!
//! [`GroupRecord`] is what the metadata store persists. [`Group`] is the
//! read-side snapshot built on top of it: the record plus the live instance
//! set and the status derived from that set. Status never reaches the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::naming;

/// Unique identifier for a scaling group, assigned at creation.
pub type GroupId = u64;

/// Provider-assigned identifier for an instance.
pub type InstanceId = String;

// ── Capacity ──────────────────────────────────────────────────────

/// Declared capacity envelope. Always satisfies `min <= desired <= max`
/// when built through [`Capacity::new`] or [`Capacity::with_desired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

impl Capacity {
    pub fn new(min: u32, desired: u32, max: u32) -> CoreResult<Self> {
        let capacity = Self { min, desired, max };
        capacity.validate()?;
        Ok(capacity)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.min <= self.desired && self.desired <= self.max {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "required: min <= desired <= max (got min={}, desired={}, max={})",
                self.min, self.desired, self.max
            )))
        }
    }

    /// Copy of this envelope with a new `desired`, re-validated.
    pub fn with_desired(&self, desired: u32) -> CoreResult<Self> {
        Self::new(self.min, desired, self.max)
    }

    /// Envelope used while a group is being torn down: nothing may remain.
    pub fn drained(&self) -> Self {
        Self {
            min: 0,
            desired: 0,
            max: self.max,
        }
    }
}

// ── Group record ──────────────────────────────────────────────────

/// Image a group provisions from: the slug the caller asked for and the
/// identifier the provider resolved it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub slug: String,
    pub provider_id: String,
}

/// Persisted identity, template and capacity of a scaling group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    /// Unique, derived from prefix, region and creation time.
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: ImageRef,
    /// User tags applied to every instance, in addition to the membership tag.
    pub tags: Vec<String>,
    pub capacity: Capacity,
    /// Unix timestamp (seconds) when the group was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last capacity change.
    pub updated_at: u64,
}

impl GroupRecord {
    /// The tag that marks an instance as a member of this group.
    pub fn membership_tag(&self) -> String {
        naming::membership_tag(self.id)
    }

    /// User tags followed by the membership tag.
    pub fn instance_tags(&self) -> Vec<String> {
        let mut tags = self.tags.clone();
        tags.push(self.membership_tag());
        tags
    }

    /// Build the key for the groups table.
    pub fn table_key(&self) -> &str {
        &self.name
    }
}

// ── Instance ──────────────────────────────────────────────────────

/// Provider-reported lifecycle status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    New,
    Active,
    Off,
    Archive,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::New => "new",
            InstanceStatus::Active => "active",
            InstanceStatus::Off => "off",
            InstanceStatus::Archive => "archive",
        };
        f.write_str(s)
    }
}

/// A compute instance as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    pub status: InstanceStatus,
    pub tags: Vec<String>,
}

impl Instance {
    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }

    /// Trailing `-<index>` of the instance name, if it has one.
    pub fn index(&self) -> Option<u64> {
        naming::parse_index(&self.name)
    }

    /// Stand-in returned by dry-run provisioning.
    pub fn placeholder(name: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            status: InstanceStatus::New,
            tags: Vec::new(),
        }
    }
}

// ── Group status ──────────────────────────────────────────────────

/// Aggregate status of a group, derived from its live instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// Just created, never refreshed.
    New,
    /// Desired is zero and nothing is running.
    Empty,
    /// Desired count reached and every instance is active.
    Ok,
    /// Desired count reached but some instances are not active yet.
    NotActive,
    /// Fewer instances than desired.
    Under,
    /// More instances than desired.
    Over,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::New => "new",
            GroupStatus::Empty => "empty",
            GroupStatus::Ok => "ok",
            GroupStatus::NotActive => "not_active",
            GroupStatus::Under => "under",
            GroupStatus::Over => "over",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(GroupStatus::New),
            "empty" => Ok(GroupStatus::Empty),
            "ok" => Ok(GroupStatus::Ok),
            "not_active" => Ok(GroupStatus::NotActive),
            "under" => Ok(GroupStatus::Under),
            "over" => Ok(GroupStatus::Over),
            other => Err(CoreError::Validation(format!("unknown group status: {other}"))),
        }
    }
}

// ── Group snapshot ────────────────────────────────────────────────

/// A group record enriched with the live state observed on the last refresh.
///
/// `instances` is a cache of the provider listing and `status` is derived from
/// it; both are replaced wholesale on every refresh and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub record: GroupRecord,
    pub instances: Vec<Instance>,
    pub status: GroupStatus,
}

impl Group {
    /// Snapshot for a record that has not been refreshed yet.
    pub fn new(record: GroupRecord) -> Self {
        Self {
            record,
            instances: Vec::new(),
            status: GroupStatus::New,
        }
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn desired(&self) -> u32 {
        self.record.capacity.desired
    }

    pub fn current_size(&self) -> usize {
        self.instances.len()
    }
}
