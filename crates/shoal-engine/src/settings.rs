//! Engine tunables, resolved from `shoal.toml`.

use std::time::Duration;

use shoal_core::{CoreResult, ShoalConfig};

/// Provisioning options applied to every instance, on top of the group
/// template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceDefaults {
    pub ssh_keys: Vec<u64>,
    pub private_networking: bool,
    pub monitoring: bool,
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Sleep between two convergence polls.
    pub poll_interval: Duration,
    /// Default bound for waiting on a status.
    pub wait_timeout: Duration,
    /// Bound for one scale-up batch.
    pub scale_up_timeout: Duration,
    /// Bound for refreshing every group in a listing.
    pub list_timeout: Duration,
    pub page_size: u32,
    /// Log provider mutations instead of performing them.
    pub dry_run: bool,
    pub instance_defaults: InstanceDefaults,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(300),
            scale_up_timeout: Duration::from_secs(300),
            list_timeout: Duration::from_secs(30),
            page_size: 200,
            dry_run: false,
            instance_defaults: InstanceDefaults::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &ShoalConfig) -> CoreResult<Self> {
        let engine = &config.engine;
        let provider = &config.provider;
        Ok(Self {
            poll_interval: engine.poll_interval()?,
            wait_timeout: engine.wait_timeout()?,
            scale_up_timeout: engine.scale_up_timeout()?,
            list_timeout: engine.list_timeout()?,
            page_size: engine.page_size,
            dry_run: engine.dry_run,
            instance_defaults: InstanceDefaults {
                ssh_keys: provider.ssh_keys.clone(),
                private_networking: provider.private_networking,
                monitoring: provider.monitoring,
                user_data: provider.user_data.clone(),
            },
        })
    }
}
