//! shoal-state: embedded state store for Shoal.
//!
//! Backed by [redb](https://docs.rs/redb). Holds scaling-group records,
//! id sequences, and the instance/snapshot tables of the sandbox provider.
//!
//! # Architecture
//!
//! Domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Group records are keyed by their unique name. Live status is never
//! stored here; it is derived from the provider listing on every read.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod groups;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use groups::GroupStore;
pub use store::StateStore;
pub use types::*;
