//! Scaling controller: one reconciliation step from actual to desired.
//!
//! Scale-up fans out one task per missing instance on a [`JoinSet`] and joins
//! them against a batch deadline. Scale-down is sequential, lowest index
//! first, and stops at the first failed delete.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shoal_core::naming;
use shoal_core::{Group, GroupRecord, Instance};
use shoal_provider::{ComputeProvider, InstanceTemplate};

use crate::error::{EngineError, EngineResult};
use crate::refresh::refresh;
use crate::settings::EngineSettings;
use crate::task::{cancellable, join_failure};

/// A provider mutation performed (or, in dry run, planned) by a scale step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScaleAction {
    Create {
        name: String,
        /// `None` when the create was only planned.
        instance_id: Option<String>,
    },
    Delete {
        name: String,
        instance_id: String,
    },
}

impl fmt::Display for ScaleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleAction::Create {
                name,
                instance_id: Some(id),
            } => write!(f, "create {name} ({id})"),
            ScaleAction::Create { name, .. } => write!(f, "create {name}"),
            ScaleAction::Delete { name, instance_id } => write!(f, "delete {name} ({instance_id})"),
        }
    }
}

/// Outcome of [`ScalingController::scale_to_desired`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleReport {
    pub group: String,
    /// Live instance count observed before scaling.
    pub from: usize,
    /// Desired count the step converged toward.
    pub to: u32,
    pub dry_run: bool,
    pub actions: Vec<ScaleAction>,
}

impl ScaleReport {
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Display for ScaleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run { "[dry run] " } else { "" };
        if self.is_noop() {
            return write!(f, "{prefix}{}: already at {} instances", self.group, self.to);
        }
        write!(f, "{prefix}{}: {} -> {}", self.group, self.from, self.to)?;
        for action in &self.actions {
            write!(f, "\n  {action}")?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ScalingController {
    provider: Arc<dyn ComputeProvider>,
    settings: EngineSettings,
}

impl ScalingController {
    pub fn new(provider: Arc<dyn ComputeProvider>, settings: EngineSettings) -> Self {
        Self { provider, settings }
    }

    /// Refresh `group`, then create or delete instances until the live count
    /// matches `desired`.
    ///
    /// `group` is left holding the pre-scale snapshot; callers refresh again
    /// or poll to observe the outcome.
    pub async fn scale_to_desired(
        &self,
        group: &mut Group,
        cancel: &CancellationToken,
    ) -> EngineResult<ScaleReport> {
        refresh(self.provider.as_ref(), group, self.settings.page_size, cancel).await?;

        let current = group.current_size();
        let desired = group.desired();
        let mut report = ScaleReport {
            group: group.name().to_string(),
            from: current,
            to: desired,
            dry_run: self.settings.dry_run,
            actions: Vec::new(),
        };

        match (desired as usize).cmp(&current) {
            Ordering::Equal => {
                debug!(group = %group.name(), current, "group already at desired size");
            }
            Ordering::Greater => {
                let count = desired as usize - current;
                info!(group = %group.name(), from = current, to = desired, dry_run = self.settings.dry_run, "scaling up");
                report.actions = self.scale_up(group, count, cancel).await?;
            }
            Ordering::Less => {
                let count = current - desired as usize;
                info!(group = %group.name(), from = current, to = desired, dry_run = self.settings.dry_run, "scaling down");
                report.actions = self.scale_down(group, count, cancel).await?;
            }
        }
        Ok(report)
    }

    async fn scale_up(
        &self,
        group: &Group,
        count: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<ScaleAction>> {
        let first = naming::next_index(group.instances.iter().map(|i| i.name.as_str()));
        let batch = cancel.child_token();
        let mut tasks: JoinSet<EngineResult<Instance>> = JoinSet::new();

        for offset in 0..count as u64 {
            let template = self.template_for(&group.record, first + offset);
            let provider = Arc::clone(&self.provider);
            let token = batch.clone();
            let dry_run = self.settings.dry_run;
            tasks.spawn(async move {
                if dry_run {
                    info!(name = %template.name, "dry run: would create instance");
                    return Ok(Instance::placeholder(&template.name));
                }
                let instance = cancellable(&token, provider.create_instance(&template)).await?;
                info!(name = %instance.name, id = %instance.id, "instance created");
                Ok(instance)
            });
        }

        let deadline = self.settings.scale_up_timeout;
        let collected = tokio::time::timeout(deadline, collect_created(&mut tasks)).await;
        let (created, failure) = match collected {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    group = %group.name(),
                    pending = tasks.len(),
                    after = ?deadline,
                    "scale-up batch timed out, cancelling outstanding creates"
                );
                batch.cancel();
                tasks.shutdown().await;
                return Err(EngineError::Timeout {
                    operation: format!("creating instances for group {}", group.name()),
                    after: deadline,
                });
            }
        };

        if let Some(err) = failure {
            warn!(group = %group.name(), created = created.len(), requested = count, "scale-up finished with failures");
            return Err(err);
        }

        let dry_run = self.settings.dry_run;
        Ok(created
            .into_iter()
            .map(|instance| ScaleAction::Create {
                instance_id: (!dry_run).then_some(instance.id),
                name: instance.name,
            })
            .collect())
    }

    async fn scale_down(
        &self,
        group: &Group,
        count: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<ScaleAction>> {
        let mut victims = group.instances.clone();
        victims.sort_by(removal_order);
        victims.truncate(count);

        let mut actions = Vec::with_capacity(victims.len());
        for victim in victims {
            if self.settings.dry_run {
                info!(name = %victim.name, id = %victim.id, "dry run: would delete instance");
            } else {
                if let Err(err) =
                    cancellable(cancel, self.provider.delete_instance(&victim.id)).await
                {
                    warn!(
                        group = %group.name(),
                        name = %victim.name,
                        removed = actions.len(),
                        error = %err,
                        "scale-down aborted"
                    );
                    return Err(err);
                }
                info!(name = %victim.name, id = %victim.id, "instance deleted");
            }
            actions.push(ScaleAction::Delete {
                name: victim.name,
                instance_id: victim.id,
            });
        }
        Ok(actions)
    }

    fn template_for(&self, record: &GroupRecord, index: u64) -> InstanceTemplate {
        let defaults = &self.settings.instance_defaults;
        InstanceTemplate {
            name: naming::instance_name(&record.name, index),
            region: record.region.clone(),
            size: record.size.clone(),
            image_id: record.image.provider_id.clone(),
            tags: record.instance_tags(),
            ssh_keys: defaults.ssh_keys.clone(),
            private_networking: defaults.private_networking,
            monitoring: defaults.monitoring,
            user_data: defaults.user_data.clone(),
        }
    }
}

/// Drain every task, keeping the successes and the first failure.
async fn collect_created(
    tasks: &mut JoinSet<EngineResult<Instance>>,
) -> (Vec<Instance>, Option<EngineError>) {
    let mut created = Vec::new();
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(join_failure).and_then(|result| result) {
            Ok(instance) => created.push(instance),
            Err(err) => {
                warn!(error = %err, "instance create failed");
                if failure.is_none() {
                    failure = Some(err);
                }
            }
        }
    }
    (created, failure)
}

/// Lowest index first; names without an index go last; ties by id.
fn removal_order(a: &Instance, b: &Instance) -> Ordering {
    match (a.index(), b.index()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}
