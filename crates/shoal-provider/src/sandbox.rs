//! Sandbox provider: instances live in the local redb state file.
//!
//! Useful for exercising the full create/scale/wait/delete cycle without a
//! cloud account. An instance reports `new` until `activation_delay` has
//! elapsed since it was created, then `active`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::{debug, info};

use shoal_core::{Instance, InstanceStatus};
use shoal_state::{SandboxInstance, StateStore};

use crate::error::{ProviderError, ProviderResult};
use crate::gateway::{ComputeProvider, InstancePage, InstanceTemplate, Page};

#[derive(Clone)]
pub struct SandboxProvider {
    state: StateStore,
    activation_delay: Duration,
}

impl SandboxProvider {
    pub fn new(state: StateStore, activation_delay: Duration) -> Self {
        Self {
            state,
            activation_delay,
        }
    }

    /// Make a snapshot name resolvable. Returns its id.
    pub fn register_snapshot(&self, name: &str) -> ProviderResult<String> {
        let id = self.state.register_sandbox_snapshot(name)?;
        debug!(%name, %id, "sandbox snapshot available");
        Ok(id)
    }

    fn to_instance(&self, stored: SandboxInstance, now_ms: u64) -> Instance {
        let age = Duration::from_millis(now_ms.saturating_sub(stored.created_at_ms));
        let status = if age >= self.activation_delay {
            InstanceStatus::Active
        } else {
            InstanceStatus::New
        };
        Instance {
            id: stored.id.to_string(),
            name: stored.name,
            status,
            tags: stored.tags,
        }
    }
}

#[async_trait]
impl ComputeProvider for SandboxProvider {
    async fn create_instance(&self, template: &InstanceTemplate) -> ProviderResult<Instance> {
        let now_ms = epoch_millis();
        let stored = self.state.create_sandbox_instance(|id| SandboxInstance {
            id,
            name: template.name.clone(),
            region: template.region.clone(),
            size: template.size.clone(),
            image_id: template.image_id.clone(),
            tags: template.tags.clone(),
            created_at_ms: now_ms,
        })?;
        info!(id = stored.id, name = %stored.name, region = %stored.region, "sandbox instance created");
        Ok(self.to_instance(stored, now_ms))
    }

    async fn delete_instance(&self, id: &str) -> ProviderResult<()> {
        let numeric: u64 = id
            .parse()
            .map_err(|_| ProviderError::NotFound(format!("instance {id}")))?;
        if !self.state.delete_sandbox_instance(numeric)? {
            return Err(ProviderError::NotFound(format!("instance {id}")));
        }
        info!(%id, "sandbox instance deleted");
        Ok(())
    }

    async fn list_instances_by_tag(&self, tag: &str, page: Page) -> ProviderResult<InstancePage> {
        let now_ms = epoch_millis();
        let tagged: Vec<Instance> = self
            .state
            .list_sandbox_instances()?
            .into_iter()
            .filter(|i| i.has_tag(tag))
            .map(|i| self.to_instance(i, now_ms))
            .collect();
        let (instances, next) = page.slice(tagged);
        Ok(InstancePage { instances, next })
    }

    async fn find_snapshot_by_name(&self, name: &str) -> ProviderResult<String> {
        self.state
            .get_sandbox_snapshot(name)?
            .ok_or_else(|| ProviderError::NotFound(format!("snapshot {name}")))
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
