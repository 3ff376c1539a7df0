//! shoal-core: shared types for the Shoal scaling-group manager.
//!
//! Holds the pieces every other crate agrees on: the persisted
//! [`GroupRecord`], the read-side [`Group`] snapshot, provider-reported
//! [`Instance`]s, the tagging/naming scheme, the status deriver, and the
//! `shoal.toml` config parser.

pub mod config;
pub mod error;
pub mod naming;
pub mod status;
pub mod types;

pub use config::ShoalConfig;
pub use error::{CoreError, CoreResult};
pub use types::*;
