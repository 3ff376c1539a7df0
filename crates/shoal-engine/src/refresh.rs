//! Replace a group's cached instance set with a fresh provider listing.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use shoal_core::Group;
use shoal_core::status;
use shoal_provider::ComputeProvider;

use crate::error::EngineResult;
use crate::task::cancellable;

/// List every instance carrying the group's membership tag and re-derive
/// its status. On error the group is left untouched.
pub(crate) async fn refresh(
    provider: &dyn ComputeProvider,
    group: &mut Group,
    page_size: u32,
    cancel: &CancellationToken,
) -> EngineResult<()> {
    let tag = group.record.membership_tag();
    let live = cancellable(cancel, provider.list_all_by_tag(&tag, page_size)).await?;
    let derived = status::derive(&live, group.desired())?;

    debug!(
        group = %group.name(),
        instances = live.len(),
        desired = group.desired(),
        status = %derived,
        "group refreshed"
    );
    group.instances = live;
    group.status = derived;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_core::{Capacity, GroupRecord, GroupStatus, ImageRef, InstanceStatus};
    use shoal_provider::{Faults, MemoryProvider};

    use crate::error::EngineError;

    fn group(desired: u32) -> Group {
        Group::new(GroupRecord {
            id: 5,
            name: "web-nyc1-20260101t000000z".to_string(),
            region: "nyc1".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            image: ImageRef {
                slug: "base".to_string(),
                provider_id: "1".to_string(),
            },
            tags: Vec::new(),
            capacity: Capacity::new(0, desired, 5).unwrap(),
            created_at: 0,
            updated_at: 0,
        })
    }

    #[tokio::test]
    async fn only_tagged_instances_count() {
        let provider = MemoryProvider::new();
        provider.insert_instance("a-0", &["group:5"], InstanceStatus::Active);
        provider.insert_instance("a-1", &["group:5"], InstanceStatus::Active);
        provider.insert_instance("b-0", &["group:6"], InstanceStatus::Active);
        provider.insert_instance("c-0", &["web"], InstanceStatus::Active);

        let mut g = group(2);
        refresh(&provider, &mut g, 200, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(g.current_size(), 2);
        assert_eq!(g.status, GroupStatus::Ok);
    }

    #[tokio::test]
    async fn failed_listing_leaves_group_untouched() {
        let provider = MemoryProvider::with_faults(Faults {
            fail_list: true,
            ..Faults::default()
        });
        let mut g = group(1);
        let err = refresh(&provider, &mut g, 200, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Provider(_)));
        assert_eq!(g.status, GroupStatus::New);
        assert!(g.instances.is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let provider = MemoryProvider::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut g = group(1);
        let err = refresh(&provider, &mut g, 200, &cancel).await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(provider.calls().lists, 0);
    }
}
