//! `shoal config`: scaffold and inspect shoal.toml.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use shoal_core::ShoalConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a shoal.toml scaffold
    Init {
        #[arg(short, long, default_value = "shoal.toml")]
        path: PathBuf,
        /// Snapshot name to pre-register with the sandbox provider
        #[arg(short, long, default_value = "base-image")]
        snapshot: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

pub fn run(action: ConfigAction, config_flag: Option<&Path>, dry_run: bool) -> Result<()> {
    match action {
        ConfigAction::Init {
            path,
            snapshot,
            force,
        } => {
            init(&path, &snapshot, force)?;
            println!("✓ Generated {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = super::effective_config(config_flag, dry_run)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

pub fn init(path: &Path, snapshot: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let store_path = path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join("shoal.redb");
    let config = ShoalConfig::scaffold(&store_path, snapshot);
    std::fs::write(path, config.to_toml_string()?)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
