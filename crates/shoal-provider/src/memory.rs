//! In-memory provider with fault injection.
//!
//! Keeps instances in a `Mutex<Vec<_>>` and lets tests script the provider's
//! behaviour through [`Faults`]: fail the n-th create or delete, fail every
//! listing, slow creates or listings down, keep new instances inactive for a
//! number of listings, or return listings in reverse creation order.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use shoal_core::{Instance, InstanceStatus};

use crate::error::{ProviderError, ProviderResult};
use crate::gateway::{ComputeProvider, InstancePage, InstanceTemplate, Page};

/// Scripted misbehaviour for [`MemoryProvider`].
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Fail the create call with this 0-based sequence number.
    pub fail_create_at: Option<usize>,
    /// Fail the delete call with this 0-based sequence number.
    pub fail_delete_at: Option<usize>,
    /// Fail every listing.
    pub fail_list: bool,
    /// Sleep this long inside every create before the instance exists.
    pub create_delay: Option<Duration>,
    /// Sleep this long inside every listing page before answering.
    pub list_delay: Option<Duration>,
    /// Number of listings a new instance must appear in before it reports
    /// `active`. Zero means active immediately.
    pub activate_after_lists: u32,
    /// Return listings newest first.
    pub reverse_listing: bool,
}

/// How many calls of each kind the provider has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub creates: usize,
    pub deletes: usize,
    pub lists: usize,
}

struct Tracked {
    instance: Instance,
    lists_seen: u32,
}

#[derive(Default)]
struct MemoryState {
    instances: Vec<Tracked>,
    snapshots: HashMap<String, String>,
    next_id: u64,
    faults: Faults,
    calls: CallCounts,
    templates: Vec<InstanceTemplate>,
}

#[derive(Default)]
pub struct MemoryProvider {
    inner: Mutex<MemoryState>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        let provider = Self::default();
        provider.set_faults(faults);
        provider
    }

    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    pub fn add_snapshot(&self, name: &str, id: &str) {
        self.lock()
            .snapshots
            .insert(name.to_string(), id.to_string());
    }

    /// Place an instance directly, as if created out of band.
    pub fn insert_instance(&self, name: &str, tags: &[&str], status: InstanceStatus) -> Instance {
        let mut state = self.lock();
        state.next_id += 1;
        let instance = Instance {
            id: state.next_id.to_string(),
            name: name.to_string(),
            status,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        state.instances.push(Tracked {
            instance: instance.clone(),
            lists_seen: 0,
        });
        instance
    }

    /// Every instance currently held, in creation order.
    pub fn instances(&self) -> Vec<Instance> {
        self.lock()
            .instances
            .iter()
            .map(|t| t.instance.clone())
            .collect()
    }

    /// Templates received by successful creates, in completion order.
    pub fn templates(&self) -> Vec<InstanceTemplate> {
        self.lock().templates.clone()
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ComputeProvider for MemoryProvider {
    async fn create_instance(&self, template: &InstanceTemplate) -> ProviderResult<Instance> {
        let delay = {
            let mut state = self.lock();
            let seq = state.calls.creates;
            state.calls.creates += 1;
            if state.faults.fail_create_at == Some(seq) {
                return Err(ProviderError::Api(format!(
                    "create {} rejected",
                    template.name
                )));
            }
            state.faults.create_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.next_id += 1;
        let status = if state.faults.activate_after_lists == 0 {
            InstanceStatus::Active
        } else {
            InstanceStatus::New
        };
        let instance = Instance {
            id: state.next_id.to_string(),
            name: template.name.clone(),
            status,
            tags: template.tags.clone(),
        };
        state.instances.push(Tracked {
            instance: instance.clone(),
            lists_seen: 0,
        });
        state.templates.push(template.clone());
        debug!(id = %instance.id, name = %instance.name, "memory instance created");
        Ok(instance)
    }

    async fn delete_instance(&self, id: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        let seq = state.calls.deletes;
        state.calls.deletes += 1;
        if state.faults.fail_delete_at == Some(seq) {
            return Err(ProviderError::Api(format!("delete {id} rejected")));
        }
        let before = state.instances.len();
        state.instances.retain(|t| t.instance.id != id);
        if state.instances.len() == before {
            return Err(ProviderError::NotFound(format!("instance {id}")));
        }
        debug!(%id, "memory instance deleted");
        Ok(())
    }

    async fn list_instances_by_tag(&self, tag: &str, page: Page) -> ProviderResult<InstancePage> {
        let delay = self.lock().faults.list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.calls.lists += 1;
        if state.faults.fail_list {
            return Err(ProviderError::Api("listing unavailable".to_string()));
        }
        let activate_after = state.faults.activate_after_lists;
        let mut tagged = Vec::new();
        for tracked in state
            .instances
            .iter_mut()
            .filter(|t| t.instance.tags.iter().any(|t| t == tag))
        {
            tracked.lists_seen += 1;
            if tracked.instance.status == InstanceStatus::New
                && tracked.lists_seen >= activate_after
            {
                tracked.instance.status = InstanceStatus::Active;
            }
            tagged.push(tracked.instance.clone());
        }
        if state.faults.reverse_listing {
            tagged.reverse();
        }
        let (instances, next) = page.slice(tagged);
        Ok(InstancePage { instances, next })
    }

    async fn find_snapshot_by_name(&self, name: &str) -> ProviderResult<String> {
        self.lock()
            .snapshots
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("snapshot {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(name: &str) -> InstanceTemplate {
        InstanceTemplate {
            name: name.to_string(),
            region: "nyc1".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            image_id: "1".to_string(),
            tags: vec!["group:1".to_string()],
            ssh_keys: Vec::new(),
            private_networking: false,
            monitoring: false,
            user_data: None,
        }
    }

    #[tokio::test]
    async fn activation_follows_listing_count() {
        let provider = MemoryProvider::with_faults(Faults {
            activate_after_lists: 2,
            ..Faults::default()
        });
        provider.create_instance(&template("g-0")).await.unwrap();

        let first = provider.list_all_by_tag("group:1", 10).await.unwrap();
        assert_eq!(first[0].status, InstanceStatus::New);
        let second = provider.list_all_by_tag("group:1", 10).await.unwrap();
        assert_eq!(second[0].status, InstanceStatus::Active);
    }

    #[tokio::test]
    async fn scripted_failures_hit_the_right_call() {
        let provider = MemoryProvider::with_faults(Faults {
            fail_create_at: Some(1),
            fail_delete_at: Some(0),
            ..Faults::default()
        });
        let a = provider.create_instance(&template("g-0")).await.unwrap();
        assert!(provider.create_instance(&template("g-1")).await.is_err());
        provider.create_instance(&template("g-2")).await.unwrap();

        assert!(provider.delete_instance(&a.id).await.is_err());
        provider.delete_instance(&a.id).await.unwrap();

        assert_eq!(provider.instances().len(), 1);
        assert_eq!(
            provider.calls(),
            CallCounts {
                creates: 3,
                deletes: 2,
                lists: 0
            }
        );
    }

    #[tokio::test]
    async fn reverse_listing_returns_newest_first() {
        let provider = MemoryProvider::with_faults(Faults {
            reverse_listing: true,
            ..Faults::default()
        });
        provider.create_instance(&template("g-0")).await.unwrap();
        provider.create_instance(&template("g-1")).await.unwrap();

        let names: Vec<String> = provider
            .list_all_by_tag("group:1", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["g-1", "g-0"]);
    }

    #[tokio::test]
    async fn unknown_snapshot_is_not_found() {
        let provider = MemoryProvider::new();
        provider.add_snapshot("base", "77");
        assert_eq!(provider.find_snapshot_by_name("base").await.unwrap(), "77");
        assert!(matches!(
            provider.find_snapshot_by_name("gpu").await,
            Err(ProviderError::NotFound(_))
        ));
    }
}
