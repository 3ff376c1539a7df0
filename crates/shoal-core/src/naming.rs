//! Tagging and naming scheme.
//!
//! Group membership is carried only by the `group:<id>` tag; the provider
//! listing filtered by that tag is the one source of truth for which
//! instances belong to a group. Instance names are `<group name>-<index>`,
//! with indices handed out monotonically per group and never repacked.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::types::GroupId;

pub const MEMBERSHIP_TAG_PREFIX: &str = "group:";

pub fn membership_tag(id: GroupId) -> String {
    format!("{MEMBERSHIP_TAG_PREFIX}{id}")
}

/// Derive a group name from the caller's prefix, the region and the
/// creation time (second resolution, lowercase so it stays hostname safe).
pub fn group_name(prefix: &str, region: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}-{region}-{}", at.format("%Y%m%dt%H%M%Sz"))
}

pub fn instance_name(group_name: &str, index: u64) -> String {
    format!("{group_name}-{index}")
}

/// Parse the trailing `-<int>` suffix of an instance name.
pub fn parse_index(name: &str) -> Option<u64> {
    let (_, suffix) = name.rsplit_once('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// One past the highest index among `names`, or 0 when none carry one.
///
/// Names without a numeric suffix are skipped.
pub fn next_index<'a, I>(names: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    let mut highest: Option<u64> = None;
    for name in names {
        match parse_index(name) {
            Some(index) => highest = Some(highest.map_or(index, |h| h.max(index))),
            None => warn!(%name, "instance name has no index suffix, skipping"),
        }
    }
    highest.map_or(0, |h| h + 1)
}

/// Split a comma-separated tag list, dropping blanks.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_index_of_nothing_is_zero() {
        assert_eq!(next_index(Vec::<&str>::new()), 0);
    }

    #[test]
    fn next_index_follows_the_highest_suffix() {
        assert_eq!(next_index(["g-0", "g-3", "g-1"]), 4);
    }

    #[test]
    fn next_index_never_fills_gaps() {
        // 0..=4 existed, 0-3 were deleted; 4 is still alive.
        assert_eq!(next_index(["g-4"]), 5);
    }

    #[test]
    fn next_index_skips_unindexed_names() {
        assert_eq!(next_index(["stray", "g-2", "g-x"]), 3);
        assert_eq!(next_index(["stray"]), 0);
    }

    #[test]
    fn parse_index_reads_only_the_last_segment() {
        assert_eq!(parse_index("web-nyc1-20260101t000000z-12"), Some(12));
        assert_eq!(parse_index("web-nyc1-20260101t000000z"), None);
        assert_eq!(parse_index("web-"), None);
        assert_eq!(parse_index("web-+1"), None);
        assert_eq!(parse_index("web"), None);
    }

    #[test]
    fn group_name_embeds_region_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 5, 3).unwrap();
        assert_eq!(group_name("web", "nyc1", at), "web-nyc1-20261019t080503z");
    }

    #[test]
    fn instance_names_round_trip_their_index() {
        let name = instance_name("web-nyc1-20261019t080503z", 7);
        assert_eq!(name, "web-nyc1-20261019t080503z-7");
        assert_eq!(parse_index(&name), Some(7));
    }

    #[test]
    fn membership_tag_format() {
        assert_eq!(membership_tag(12), "group:12");
    }

    #[test]
    fn split_tags_drops_blanks() {
        assert_eq!(split_tags("web, prod,,"), vec!["web", "prod"]);
        assert!(split_tags("").is_empty());
    }
}
