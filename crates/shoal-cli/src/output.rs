//! Table and JSON rendering for command output.

use clap::ValueEnum;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use shoal_core::{Group, Instance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize, Tabled)]
pub struct GroupRow {
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "STATUS")]
    pub status: String,
    #[tabled(rename = "CURR")]
    pub current: usize,
    #[tabled(rename = "DESIRED")]
    pub desired: u32,
    #[tabled(rename = "MIN")]
    pub min: u32,
    #[tabled(rename = "MAX")]
    pub max: u32,
    #[tabled(rename = "REGION")]
    pub region: String,
    #[tabled(rename = "SIZE")]
    pub size: String,
}

impl From<&Group> for GroupRow {
    fn from(group: &Group) -> Self {
        let capacity = group.record.capacity;
        Self {
            name: group.name().to_string(),
            status: group.status.to_string(),
            current: group.current_size(),
            desired: capacity.desired,
            min: capacity.min,
            max: capacity.max,
            region: group.record.region.clone(),
            size: group.record.size.clone(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct InstanceRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "STATUS")]
    pub status: String,
}

impl From<&Instance> for InstanceRow {
    fn from(instance: &Instance) -> Self {
        Self {
            id: instance.id.clone(),
            name: instance.name.clone(),
            status: instance.status.to_string(),
        }
    }
}

pub fn groups_table(groups: &[Group]) -> String {
    table(groups.iter().map(GroupRow::from))
}

pub fn instances_table(instances: &[Instance]) -> String {
    table(instances.iter().map(InstanceRow::from))
}

fn table<R: Tabled>(rows: impl IntoIterator<Item = R>) -> String {
    Table::new(rows).with(Style::blank()).to_string()
}

/// Key/value summary of one group, as printed by `group show`.
pub fn group_summary(group: &Group) -> String {
    let record = &group.record;
    let tags = if record.tags.is_empty() {
        "-".to_string()
    } else {
        record.tags.join(",")
    };
    [
        format!("Name:      {}", record.name),
        format!("Id:        {}", record.id),
        format!("Status:    {}", group.status),
        format!(
            "Capacity:  {} running / {} desired (min {}, max {})",
            group.current_size(),
            record.capacity.desired,
            record.capacity.min,
            record.capacity.max
        ),
        format!("Region:    {}", record.region),
        format!("Size:      {}", record.size),
        format!("Snapshot:  {} ({})", record.image.slug, record.image.provider_id),
        format!("Tags:      {tags}"),
        format!("Member tag: {}", record.membership_tag()),
    ]
    .join("\n")
}
