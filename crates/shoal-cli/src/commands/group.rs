//! `shoal group`: scaling group lifecycle.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use shoal_core::config::parse_duration;
use shoal_core::naming::split_tags;
use shoal_core::{Group, GroupStatus};
use shoal_engine::{CreateGroupOptions, GroupManager};

use super::Backend;
use crate::output::{self, OutputFormat};

/// Statuses a refreshed group can reach. `new` only exists before the
/// first refresh, so it is not waitable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WaitStatus {
    Empty,
    Ok,
    #[value(name = "not_active")]
    NotActive,
    Under,
    Over,
}

impl From<WaitStatus> for GroupStatus {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Empty => GroupStatus::Empty,
            WaitStatus::Ok => GroupStatus::Ok,
            WaitStatus::NotActive => GroupStatus::NotActive,
            WaitStatus::Under => GroupStatus::Under,
            WaitStatus::Over => GroupStatus::Over,
        }
    }
}

#[derive(Subcommand)]
pub enum GroupAction {
    /// Create a group and scale it to its desired size
    Create {
        /// Name prefix; region and creation time are appended
        #[arg(short, long)]
        name: String,
        /// Snapshot to boot instances from
        #[arg(short, long)]
        snapshot: String,
        #[arg(short, long)]
        region: String,
        /// Instance size slug
        #[arg(long)]
        size: String,
        /// Extra instance tags (repeatable, or comma separated)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        min: u32,
        #[arg(long)]
        desired: u32,
        #[arg(long)]
        max: u32,
        /// Wait for the group to converge (`ok`, or `empty` when desired is 0)
        #[arg(short, long)]
        wait: bool,
        /// Only persist the group; do not create instances
        #[arg(long, conflicts_with = "wait")]
        no_scale: bool,
    },
    /// List groups with their live status
    Ls {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show one group and its instances
    Show {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Converge a group on its desired size, optionally changing it first
    Scale {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        desired: Option<u32>,
        /// Wait for the group to converge (`ok`, or `empty` when desired is 0)
        #[arg(short, long)]
        wait: bool,
    },
    /// Block until a group reaches a status
    Wait {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, value_enum, default_value_t = WaitStatus::Ok)]
        status: WaitStatus,
        /// e.g. 90s, 5m (default: engine.wait_timeout)
        #[arg(short, long)]
        timeout: Option<String>,
    },
    /// Drain a group to zero instances and delete it
    Rm {
        #[arg(short, long)]
        name: String,
    },
}

pub async fn run(backend: &Backend, action: GroupAction, cancel: &CancellationToken) -> Result<()> {
    let manager = &backend.manager;
    match action {
        GroupAction::Create {
            name,
            snapshot,
            region,
            size,
            tags,
            min,
            desired,
            max,
            wait,
            no_scale,
        } => {
            let opts = CreateGroupOptions {
                name,
                region,
                size,
                snapshot,
                tags: tags.iter().flat_map(|raw| split_tags(raw)).collect(),
                min,
                desired,
                max,
            };
            create(manager, opts, !no_scale, wait, cancel).await
        }
        GroupAction::Ls { format } => list(manager, format, cancel).await,
        GroupAction::Show { name, format } => show(manager, &name, format, cancel).await,
        GroupAction::Scale {
            name,
            desired,
            wait,
        } => scale(manager, &name, desired, wait, cancel).await,
        GroupAction::Wait {
            name,
            status,
            timeout,
        } => {
            let target = GroupStatus::from(status);
            let timeout = timeout.as_deref().map(parse_duration).transpose()?;
            let mut group = manager.get_group(&name, cancel).await?;
            manager
                .wait_for_status(&mut group, target, timeout, cancel)
                .await
                .with_context(|| format!("wait for {name} to reach {target}"))?;
            println!("✓ {name} is {target}");
            Ok(())
        }
        GroupAction::Rm { name } => {
            let report = manager
                .delete_group(&name, cancel)
                .await
                .with_context(|| format!("delete group {name}"))?;
            println!("{report}");
            if report.dry_run {
                println!("[dry run] {name} kept");
            } else {
                println!("✓ Deleted group {name}");
            }
            Ok(())
        }
    }
}

async fn create(
    manager: &GroupManager,
    opts: CreateGroupOptions,
    scale: bool,
    wait: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut group = manager
        .create_group(opts, cancel)
        .await
        .context("create group")?;
    println!("✓ Created group {}", group.name());
    if !scale {
        return Ok(());
    }

    let report = manager
        .scale_to_desired(&mut group, cancel)
        .await
        .with_context(|| format!("scale {}", group.name()))?;
    println!("{report}");
    if wait {
        wait_for_convergence(manager, &mut group, report.dry_run, cancel).await?;
    }
    Ok(())
}

async fn list(
    manager: &GroupManager,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let groups = manager.list_groups(cancel).await.context("list groups")?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
        OutputFormat::Text if groups.is_empty() => println!("No groups."),
        OutputFormat::Text => println!("{}", output::groups_table(&groups)),
    }
    Ok(())
}

async fn show(
    manager: &GroupManager,
    name: &str,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let group = manager.get_group(name, cancel).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&group)?),
        OutputFormat::Text => {
            println!("{}", output::group_summary(&group));
            if !group.instances.is_empty() {
                println!();
                println!("{}", output::instances_table(&group.instances));
            }
        }
    }
    Ok(())
}

async fn scale(
    manager: &GroupManager,
    name: &str,
    desired: Option<u32>,
    wait: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut group = manager.get_group(name, cancel).await?;
    if let Some(desired) = desired {
        manager.set_desired(&mut group, desired)?;
    }
    let report = manager
        .scale_to_desired(&mut group, cancel)
        .await
        .with_context(|| format!("scale {name}"))?;
    println!("{report}");
    if wait {
        wait_for_convergence(manager, &mut group, report.dry_run, cancel).await?;
    }
    Ok(())
}

/// Status a group settles in once it matches its desired count.
fn converged_status(group: &Group) -> GroupStatus {
    if group.desired() == 0 {
        GroupStatus::Empty
    } else {
        GroupStatus::Ok
    }
}

async fn wait_for_convergence(
    manager: &GroupManager,
    group: &mut Group,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    // Nothing was created, so there is nothing to wait for.
    if dry_run {
        println!("[dry run] skipping wait");
        return Ok(());
    }
    let target = converged_status(group);
    manager
        .wait_for_status(group, target, None, cancel)
        .await
        .with_context(|| format!("wait for {} to reach {target}", group.name()))?;
    println!("✓ {} is {target} ({} instances)", group.name(), group.current_size());
    Ok(())
}
