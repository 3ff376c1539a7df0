//! Subcommand handlers and the backend they share.

pub mod config;
pub mod group;
pub mod snapshot;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use shoal_core::ShoalConfig;
use shoal_core::config::ProviderKind;
use shoal_engine::{EngineSettings, GroupManager};
use shoal_provider::SandboxProvider;
use shoal_state::StateStore;

pub const CONFIG_ENV: &str = "SHOAL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "shoal.toml";

/// The opened store and provider, and a manager wired to both.
pub struct Backend {
    pub sandbox: SandboxProvider,
    pub manager: GroupManager,
}

impl Backend {
    pub fn open(config_flag: Option<&Path>, dry_run: bool) -> Result<Self> {
        let config = effective_config(config_flag, dry_run)?;

        let store_path = &config.store.path;
        if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create state directory {}", parent.display()))?;
        }
        let store = StateStore::open(store_path)
            .with_context(|| format!("open state store {}", store_path.display()))?;
        debug!(path = %store_path.display(), "state store opened");

        let sandbox = match config.provider.kind {
            ProviderKind::Sandbox => {
                SandboxProvider::new(store.clone(), config.provider.activation_delay()?)
            }
        };
        for snapshot in &config.provider.snapshots {
            sandbox
                .register_snapshot(snapshot)
                .with_context(|| format!("register snapshot {snapshot}"))?;
        }

        let settings = EngineSettings::from_config(&config)?;
        if settings.dry_run {
            info!("dry run: no instances will be created or deleted");
        }
        let manager = GroupManager::new(Arc::new(store), Arc::new(sandbox.clone()), settings);

        Ok(Self {
            sandbox,
            manager,
        })
    }
}

/// Config file plus environment overrides plus `--dry-run`.
pub fn effective_config(config_flag: Option<&Path>, dry_run: bool) -> Result<ShoalConfig> {
    let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut config = load_config(config_flag, env_path.as_deref())?;
    config
        .apply_env(|key| std::env::var(key).ok())
        .context("invalid environment override")?;
    if dry_run {
        config.engine.dry_run = true;
    }
    Ok(config)
}

/// Resolve the config file: explicit flag, then `$SHOAL_CONFIG`, then
/// `./shoal.toml`. An explicitly named file must exist; a missing default
/// file means built-in defaults.
pub fn load_config(flag: Option<&Path>, env: Option<&Path>) -> Result<ShoalConfig> {
    let (path, explicit) = match (flag, env) {
        (Some(path), _) => (path, true),
        (None, Some(path)) => (path, true),
        (None, None) => (Path::new(DEFAULT_CONFIG_FILE), false),
    };

    if !explicit && !path.is_file() {
        debug!("no shoal.toml found, using defaults");
        return Ok(ShoalConfig::default());
    }
    let config = ShoalConfig::from_file(path)
        .with_context(|| format!("load config {}", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}
