//! Status deriver: maps a live instance set and a desired count to a
//! [`GroupStatus`].

use std::cmp::Ordering;

use crate::error::{CoreError, CoreResult};
use crate::types::{GroupStatus, Instance};

/// Derive a group's status from its live instances.
///
/// Never returns [`GroupStatus::New`]; that status only exists before the
/// first refresh.
pub fn derive(live: &[Instance], desired: u32) -> CoreResult<GroupStatus> {
    let current = u32::try_from(live.len()).map_err(|_| {
        CoreError::Invariant(format!(
            "live instance count {} does not fit the capacity range",
            live.len()
        ))
    })?;

    let status = match current.cmp(&desired) {
        Ordering::Equal if desired == 0 => GroupStatus::Empty,
        Ordering::Equal if live.iter().all(Instance::is_active) => GroupStatus::Ok,
        Ordering::Equal => GroupStatus::NotActive,
        Ordering::Less => GroupStatus::Under,
        Ordering::Greater => GroupStatus::Over,
    };
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstanceStatus;

    fn instances(statuses: &[InstanceStatus]) -> Vec<Instance> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| Instance {
                id: i.to_string(),
                name: format!("g-{i}"),
                status: *status,
                tags: vec!["group:1".to_string()],
            })
            .collect()
    }

    use InstanceStatus::{Active, New, Off};

    #[test]
    fn derive_table() {
        let cases: &[(&[InstanceStatus], u32, GroupStatus)] = &[
            (&[], 0, GroupStatus::Empty),
            (&[], 1, GroupStatus::Under),
            (&[Active], 0, GroupStatus::Over),
            (&[Active], 1, GroupStatus::Ok),
            (&[New], 1, GroupStatus::NotActive),
            (&[Active, Active, Active], 3, GroupStatus::Ok),
            (&[Active, New, Active], 3, GroupStatus::NotActive),
            (&[Active, Off, Active], 3, GroupStatus::NotActive),
            (&[Active, Active], 3, GroupStatus::Under),
            (&[Active, Active, Active, Active], 3, GroupStatus::Over),
            (&[New, New, New, New], 3, GroupStatus::Over),
            (&[New, New], 3, GroupStatus::Under),
        ];

        for (statuses, desired, expected) in cases {
            let live = instances(statuses);
            let got = derive(&live, *desired).unwrap();
            assert_eq!(
                got, *expected,
                "live={statuses:?} desired={desired}"
            );
        }
    }

    #[test]
    fn derive_never_reports_new() {
        for count in 0..4usize {
            for desired in 0..4u32 {
                let live = instances(&vec![Active; count]);
                assert_ne!(derive(&live, desired).unwrap(), GroupStatus::New);
            }
        }
    }
}
