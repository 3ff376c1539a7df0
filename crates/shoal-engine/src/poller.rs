//! Convergence poller: refresh, derive, compare, sleep, until the group
//! reaches a target status or the deadline passes.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shoal_core::{Group, GroupStatus};
use shoal_provider::ComputeProvider;

use crate::error::{EngineError, EngineResult};
use crate::refresh::refresh;
use crate::settings::EngineSettings;

#[derive(Clone)]
pub struct ConvergencePoller {
    provider: Arc<dyn ComputeProvider>,
    settings: EngineSettings,
}

impl ConvergencePoller {
    pub fn new(provider: Arc<dyn ComputeProvider>, settings: EngineSettings) -> Self {
        Self { provider, settings }
    }

    /// Poll until `group.status == target`.
    ///
    /// The first pass runs immediately; later passes are `poll_interval`
    /// apart. Refresh failures are logged and retried until `timeout`. On
    /// timeout or cancellation the poll loop is dropped along with any
    /// listing in flight. `group` holds the last successful observation.
    pub async fn wait_for_status(
        &self,
        group: &mut Group,
        target: GroupStatus,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        info!(group = %group.name(), %target, ?timeout, "waiting for group status");
        let polled = tokio::time::timeout(timeout, self.poll_until(group, target, cancel)).await;
        match polled {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    group = %group.name(),
                    %target,
                    last = %group.status,
                    current = group.current_size(),
                    desired = group.desired(),
                    "gave up waiting for group status"
                );
                Err(EngineError::Timeout {
                    operation: format!("waiting for group {} to reach {target}", group.name()),
                    after: timeout,
                })
            }
        }
    }

    async fn poll_until(
        &self,
        group: &mut Group,
        target: GroupStatus,
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match refresh(self.provider.as_ref(), group, self.settings.page_size, cancel).await {
                Ok(()) if group.status == target => {
                    info!(group = %group.name(), %target, attempt, "group reached status");
                    return Ok(());
                }
                Ok(()) => debug!(
                    group = %group.name(),
                    attempt,
                    status = %group.status,
                    %target,
                    current = group.current_size(),
                    desired = group.desired(),
                    "group not converged yet"
                ),
                Err(err @ (EngineError::Cancelled | EngineError::Invariant(_))) => return Err(err),
                Err(err) => warn!(group = %group.name(), attempt, error = %err, "refresh failed, will retry"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_core::{Capacity, GroupRecord, ImageRef, InstanceStatus};
    use shoal_provider::{Faults, MemoryProvider};

    fn group(desired: u32) -> Group {
        Group::new(GroupRecord {
            id: 3,
            name: "api-ams3-20260101t000000z".to_string(),
            region: "ams3".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            image: ImageRef {
                slug: "base".to_string(),
                provider_id: "1".to_string(),
            },
            tags: Vec::new(),
            capacity: Capacity::new(0, desired, 4).unwrap(),
            created_at: 0,
            updated_at: 0,
        })
    }

    fn poller(provider: &Arc<MemoryProvider>) -> ConvergencePoller {
        ConvergencePoller::new(provider.clone(), EngineSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn returns_on_first_pass_when_already_converged() {
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_instance("a-0", &["group:3"], InstanceStatus::Active);

        let mut g = group(1);
        poller(&provider)
            .wait_for_status(&mut g, GroupStatus::Ok, Duration::from_secs(30), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(provider.calls().lists, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_active_until_provider_reports_active() {
        let provider = Arc::new(MemoryProvider::with_faults(Faults {
            activate_after_lists: 3,
            ..Faults::default()
        }));
        provider.insert_instance("a-0", &["group:3"], InstanceStatus::New);

        let mut g = group(1);
        poller(&provider)
            .wait_for_status(&mut g, GroupStatus::Ok, Duration::from_secs(60), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(provider.calls().lists, 3);
        assert_eq!(g.status, GroupStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_failures_are_retried_until_timeout() {
        let provider = Arc::new(MemoryProvider::with_faults(Faults {
            fail_list: true,
            ..Faults::default()
        }));

        let mut g = group(1);
        let err = poller(&provider)
            .wait_for_status(&mut g, GroupStatus::Ok, Duration::from_secs(22), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }));
        // Passes at 0s, 5s, 10s, 15s and 20s.
        assert_eq!(provider.calls().lists, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_ends_the_wait() {
        let provider = Arc::new(MemoryProvider::new());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });

        let mut g = group(2);
        let err = poller(&provider)
            .wait_for_status(&mut g, GroupStatus::Ok, Duration::from_secs(300), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(g.status, GroupStatus::Under);
    }
}
