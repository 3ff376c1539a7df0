//! `shoal snapshot`: make snapshot names resolvable by the sandbox provider.

use anyhow::{Context, Result};
use clap::Subcommand;

use super::Backend;

#[derive(Subcommand)]
pub enum SnapshotAction {
    /// Register a snapshot name and print its id
    Add {
        #[arg(short, long)]
        name: String,
    },
}

pub fn run(backend: &Backend, action: SnapshotAction) -> Result<()> {
    match action {
        SnapshotAction::Add { name } => {
            let id = backend
                .sandbox
                .register_snapshot(&name)
                .with_context(|| format!("register snapshot {name}"))?;
            println!("✓ Snapshot {name} available as {id}");
            Ok(())
        }
    }
}
