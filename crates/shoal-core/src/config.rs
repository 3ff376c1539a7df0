//! shoal.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShoalConfig {
    pub store: StoreConfig,
    pub provider: ProviderConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the redb state file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("shoal.redb"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local provider that keeps instances in the state file.
    #[default]
    Sandbox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// How long a sandbox instance reports `new` before turning `active`.
    pub activation_delay: String,
    /// Snapshot names registered with the sandbox provider on startup.
    pub snapshots: Vec<String>,
    /// SSH key ids attached to every new instance.
    pub ssh_keys: Vec<u64>,
    pub private_networking: bool,
    pub monitoring: bool,
    pub user_data: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Sandbox,
            activation_delay: "10s".to_string(),
            snapshots: Vec::new(),
            ssh_keys: Vec::new(),
            private_networking: true,
            monitoring: true,
            user_data: None,
        }
    }
}

impl ProviderConfig {
    pub fn activation_delay(&self) -> CoreResult<Duration> {
        parse_duration(&self.activation_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log provider mutations instead of performing them.
    pub dry_run: bool,
    pub poll_interval: String,
    pub wait_timeout: String,
    pub scale_up_timeout: String,
    pub list_timeout: String,
    /// Page size used when listing instances by tag.
    pub page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            poll_interval: "5s".to_string(),
            wait_timeout: "5m".to_string(),
            scale_up_timeout: "5m".to_string(),
            list_timeout: "30s".to_string(),
            page_size: 200,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> CoreResult<Duration> {
        parse_duration(&self.poll_interval)
    }

    pub fn wait_timeout(&self) -> CoreResult<Duration> {
        parse_duration(&self.wait_timeout)
    }

    pub fn scale_up_timeout(&self) -> CoreResult<Duration> {
        parse_duration(&self.scale_up_timeout)
    }

    pub fn list_timeout(&self) -> CoreResult<Duration> {
        parse_duration(&self.list_timeout)
    }
}

impl ShoalConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: ShoalConfig =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Check every duration parses and the page size is usable.
    pub fn validate(&self) -> CoreResult<()> {
        self.provider.activation_delay()?;
        self.engine.poll_interval()?;
        self.engine.wait_timeout()?;
        self.engine.scale_up_timeout()?;
        self.engine.list_timeout()?;
        if self.engine.page_size == 0 {
            return Err(CoreError::Config("engine.page_size must be > 0".to_string()));
        }
        Ok(())
    }

    /// Apply `SHOAL_STORE_PATH` and `SHOAL_DRY_RUN` overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> CoreResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SHOAL_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("SHOAL_DRY_RUN") {
            self.engine.dry_run = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(CoreError::Config(format!(
                        "SHOAL_DRY_RUN: expected a boolean, got {other:?}"
                    )));
                }
            };
        }
        Ok(())
    }

    /// Scaffold a shoal.toml with a sandbox provider and one snapshot.
    pub fn scaffold(store_path: &Path, snapshot: &str) -> Self {
        ShoalConfig {
            store: StoreConfig {
                path: store_path.to_path_buf(),
            },
            provider: ProviderConfig {
                snapshots: vec![snapshot.to_string()],
                ..ProviderConfig::default()
            },
            engine: EngineConfig::default(),
        }
    }
}

/// Parse a duration string like "30s", "5m", "1h" or bare seconds.
pub fn parse_duration(s: &str) -> CoreResult<Duration> {
    let s = s.trim();
    let (digits, scale) = if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else {
        (s, 1)
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("invalid duration: {s:?}")))?;
    let secs = value
        .checked_mul(scale)
        .ok_or_else(|| CoreError::Config(format!("duration out of range: {s:?}")))?;
    Ok(Duration::from_secs(secs))
}
