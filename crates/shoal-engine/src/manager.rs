//! Group lifecycle: create, inspect, resize, delete and list scaling groups.
//!
//! The manager owns no global state. Its store, provider and settings are
//! injected at construction, so several managers (or tests) can coexist in
//! one process.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shoal_core::naming;
use shoal_core::{Capacity, Group, GroupRecord, GroupStatus, ImageRef};
use shoal_provider::ComputeProvider;
use shoal_state::GroupStore;

use crate::error::{EngineError, EngineResult};
use crate::poller::ConvergencePoller;
use crate::refresh::refresh;
use crate::scaler::{ScaleReport, ScalingController};
use crate::settings::EngineSettings;
use crate::task::{cancellable, join_failure};

/// Caller input for [`GroupManager::create_group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroupOptions {
    /// Name prefix; the full name adds region and creation time.
    pub name: String,
    pub region: String,
    pub size: String,
    /// Snapshot name, resolved through the provider.
    pub snapshot: String,
    pub tags: Vec<String>,
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

impl CreateGroupOptions {
    fn validate(&self) -> EngineResult<Capacity> {
        for (field, value) in [
            ("name", &self.name),
            ("region", &self.region),
            ("size", &self.size),
            ("snapshot", &self.snapshot),
        ] {
            if value.trim().is_empty() {
                return Err(EngineError::Validation(format!("{field} must not be empty")));
            }
        }
        Ok(Capacity::new(self.min, self.desired, self.max)?)
    }
}

#[derive(Clone)]
pub struct GroupManager {
    store: Arc<dyn GroupStore>,
    provider: Arc<dyn ComputeProvider>,
    settings: EngineSettings,
    scaler: ScalingController,
    poller: ConvergencePoller,
}

impl GroupManager {
    pub fn new(
        store: Arc<dyn GroupStore>,
        provider: Arc<dyn ComputeProvider>,
        settings: EngineSettings,
    ) -> Self {
        let scaler = ScalingController::new(Arc::clone(&provider), settings.clone());
        let poller = ConvergencePoller::new(Arc::clone(&provider), settings.clone());
        Self {
            store,
            provider,
            settings,
            scaler,
            poller,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Validate, resolve the snapshot, derive the name and persist a new
    /// record. No instances are created; the returned group is `new`.
    ///
    /// In dry run nothing is persisted and the group carries id 0.
    pub async fn create_group(
        &self,
        opts: CreateGroupOptions,
        cancel: &CancellationToken,
    ) -> EngineResult<Group> {
        let capacity = opts.validate()?;
        let image_id =
            cancellable(cancel, self.provider.find_snapshot_by_name(&opts.snapshot)).await?;

        let now = Utc::now();
        let id = if self.settings.dry_run {
            0
        } else {
            self.store.next_group_id()?
        };
        let record = GroupRecord {
            id,
            name: naming::group_name(&opts.name, &opts.region, now),
            region: opts.region,
            size: opts.size,
            image: ImageRef {
                slug: opts.snapshot,
                provider_id: image_id,
            },
            tags: opts.tags,
            capacity,
            created_at: unix_seconds(now),
            updated_at: unix_seconds(now),
        };

        if self.settings.dry_run {
            info!(group = %record.name, "dry run: would create group");
        } else {
            self.store.create_group(&record)?;
            info!(
                group = %record.name,
                id = record.id,
                min = capacity.min,
                desired = capacity.desired,
                max = capacity.max,
                "group created"
            );
        }
        Ok(Group::new(record))
    }

    /// Load a group and refresh its live state.
    pub async fn get_group(&self, name: &str, cancel: &CancellationToken) -> EngineResult<Group> {
        let record = self.store.get_group_by_name(name)?;
        let mut group = Group::new(record);
        refresh(self.provider.as_ref(), &mut group, self.settings.page_size, cancel).await?;
        Ok(group)
    }

    /// Change `desired` and persist it. Does not converge; status stays as
    /// last observed until the next refresh.
    pub fn set_desired(&self, group: &mut Group, desired: u32) -> EngineResult<()> {
        let capacity = group.record.capacity.with_desired(desired)?;
        let mut record = group.record.clone();
        record.capacity = capacity;
        record.updated_at = unix_seconds(Utc::now());

        if self.settings.dry_run {
            info!(group = %record.name, desired, "dry run: desired count not persisted");
        } else {
            self.store.save_group(&record)?;
            info!(group = %record.name, desired, "desired count updated");
        }
        group.record = record;
        Ok(())
    }

    pub async fn scale_to_desired(
        &self,
        group: &mut Group,
        cancel: &CancellationToken,
    ) -> EngineResult<ScaleReport> {
        self.scaler.scale_to_desired(group, cancel).await
    }

    /// Wait for `target`, bounded by `timeout` or the configured default.
    pub async fn wait_for_status(
        &self,
        group: &mut Group,
        target: GroupStatus,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        let timeout = timeout.unwrap_or(self.settings.wait_timeout);
        self.poller
            .wait_for_status(group, target, timeout, cancel)
            .await
    }

    /// Drain a group to zero and remove its record.
    ///
    /// The record is first persisted with `min = 0, desired = 0` so an
    /// interrupted delete can be resumed. It is removed only after every
    /// instance is gone; a failed scale-down or drain timeout keeps it.
    pub async fn delete_group(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> EngineResult<ScaleReport> {
        let mut group = Group::new(self.store.get_group_by_name(name)?);
        let drained = group.record.capacity.drained();

        if self.settings.dry_run {
            group.record.capacity = drained;
            let report = self.scaler.scale_to_desired(&mut group, cancel).await?;
            info!(group = %name, "dry run: would remove group record");
            return Ok(report);
        }

        if group.record.capacity != drained {
            group.record.capacity = drained;
            group.record.updated_at = unix_seconds(Utc::now());
            self.store.save_group(&group.record)?;
            debug!(group = %name, "group put in drain mode");
        }

        let report = self.scaler.scale_to_desired(&mut group, cancel).await?;
        if let Err(err) = self
            .poller
            .wait_for_status(&mut group, GroupStatus::Empty, self.settings.wait_timeout, cancel)
            .await
        {
            warn!(group = %name, error = %err, "group did not drain, keeping record");
            return Err(err);
        }

        self.store.delete_group(&group.record)?;
        info!(group = %name, removed = report.actions.len(), "group deleted");
        Ok(report)
    }

    /// Every group, refreshed concurrently, in store order.
    ///
    /// The whole listing fails if any refresh fails or if the refreshes do
    /// not finish within `list_timeout`.
    pub async fn list_groups(&self, cancel: &CancellationToken) -> EngineResult<Vec<Group>> {
        let records = self.store.list_groups()?;
        let batch = cancel.child_token();
        let mut tasks: JoinSet<EngineResult<(usize, Group)>> = JoinSet::new();

        for (position, record) in records.into_iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let token = batch.clone();
            let page_size = self.settings.page_size;
            tasks.spawn(async move {
                let mut group = Group::new(record);
                refresh(provider.as_ref(), &mut group, page_size, &token).await?;
                Ok((position, group))
            });
        }

        let deadline = self.settings.list_timeout;
        let collected = tokio::time::timeout(deadline, collect_refreshed(&mut tasks)).await;
        let mut refreshed = match collected {
            Ok(result) => result?,
            Err(_) => {
                warn!(pending = tasks.len(), after = ?deadline, "group listing timed out");
                batch.cancel();
                tasks.shutdown().await;
                return Err(EngineError::Timeout {
                    operation: "refreshing groups".to_string(),
                    after: deadline,
                });
            }
        };

        refreshed.sort_by_key(|(position, _)| *position);
        Ok(refreshed.into_iter().map(|(_, group)| group).collect())
    }
}

/// Join every refresh; the first failure cancels nothing but is returned
/// once the set is drained.
async fn collect_refreshed(
    tasks: &mut JoinSet<EngineResult<(usize, Group)>>,
) -> EngineResult<Vec<(usize, Group)>> {
    let mut refreshed = Vec::with_capacity(tasks.len());
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(join_failure).and_then(|result| result) {
            Ok(entry) => refreshed.push(entry),
            Err(err) => {
                warn!(error = %err, "group refresh failed");
                if failure.is_none() {
                    failure = Some(err);
                }
            }
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(refreshed),
    }
}

fn unix_seconds(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_core::InstanceStatus;
    use shoal_provider::{CallCounts, MemoryProvider};
    use shoal_state::{StateError, StateStore};

    fn options(desired: u32) -> CreateGroupOptions {
        CreateGroupOptions {
            name: "web".to_string(),
            region: "nyc1".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            snapshot: "base".to_string(),
            tags: vec!["web".to_string()],
            min: 0,
            desired,
            max: 5,
        }
    }

    fn setup() -> (Arc<StateStore>, Arc<MemoryProvider>, GroupManager) {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let provider = Arc::new(MemoryProvider::new());
        provider.add_snapshot("base", "42");
        let manager = GroupManager::new(store.clone(), provider.clone(), EngineSettings::default());
        (store, provider, manager)
    }

    #[tokio::test]
    async fn create_persists_record_without_instances() {
        let (store, provider, manager) = setup();
        let group = manager
            .create_group(options(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(group.status, GroupStatus::New);
        assert!(group.instances.is_empty());
        assert!(group.name().starts_with("web-nyc1-"));
        assert_eq!(group.record.image.provider_id, "42");
        assert_eq!(store.get_group_by_name(group.name()).unwrap(), group.record);
        assert_eq!(provider.calls().creates, 0);
    }

    #[tokio::test]
    async fn blank_fields_are_rejected_before_lookup() {
        let (store, provider, manager) = setup();
        let mut opts = options(1);
        opts.region = " ".to_string();

        let err = manager
            .create_group(opts, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("region")));
        assert!(GroupStore::list_groups(store.as_ref()).unwrap().is_empty());
        assert_eq!(provider.calls(), CallCounts::default());
    }

    #[tokio::test]
    async fn set_desired_persists_without_converging() {
        let (store, provider, manager) = setup();
        let mut group = manager
            .create_group(options(1), &CancellationToken::new())
            .await
            .unwrap();

        manager.set_desired(&mut group, 4).unwrap();
        assert_eq!(group.desired(), 4);
        assert_eq!(group.status, GroupStatus::New);
        assert_eq!(store.get_group_by_name(group.name()).unwrap().capacity.desired, 4);
        assert_eq!(provider.calls().creates, 0);

        let err = manager.set_desired(&mut group, 9).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(store.get_group_by_name(group.name()).unwrap().capacity.desired, 4);
    }

    #[tokio::test]
    async fn get_group_refreshes_live_state() {
        let (_store, provider, manager) = setup();
        let group = manager
            .create_group(options(2), &CancellationToken::new())
            .await
            .unwrap();
        let tag = group.record.membership_tag();
        provider.insert_instance(&format!("{}-0", group.name()), &[tag.as_str()], InstanceStatus::Active);

        let fetched = manager
            .get_group(group.name(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(fetched.current_size(), 1);
        assert_eq!(fetched.status, GroupStatus::Under);

        let missing = manager.get_group("nope", &CancellationToken::new()).await;
        assert!(matches!(missing, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn save_after_delete_is_not_found() {
        let (store, _provider, manager) = setup();
        let mut group = manager
            .create_group(options(0), &CancellationToken::new())
            .await
            .unwrap();
        store.delete_group(&group.record).unwrap();

        let err = manager.set_desired(&mut group, 1).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(matches!(
            store.get_group_by_name(group.name()),
            Err(StateError::NotFound(_))
        ));
    }
}
