//! shoal-provider: the compute-provider gateway.
//!
//! The reconciliation engine talks to a cloud only through
//! [`ComputeProvider`]. Two implementations ship here:
//!
//! - [`SandboxProvider`] keeps instances in the redb state file so the CLI
//!   can run end to end on one machine. Instances report `new` until an
//!   activation delay has passed, then `active`.
//! - [`MemoryProvider`] keeps instances in process and exposes fault knobs
//!   (failing calls, slow creates, delayed activation, reordered listings)
//!   for tests.
//!
//! ```text
//! ComputeProvider
//!   ├── create_instance(template)  → Instance
//!   ├── delete_instance(id)
//!   ├── list_instances_by_tag(tag, page) → InstancePage
//!   ├── find_snapshot_by_name(name) → snapshot id
//!   └── list_all_by_tag(tag, per_page)   (walks every page)
//! ```

pub mod error;
pub mod gateway;
pub mod memory;
pub mod sandbox;

pub use error::{ProviderError, ProviderResult};
pub use gateway::{ComputeProvider, InstancePage, InstanceTemplate, Page};
pub use memory::{CallCounts, Faults, MemoryProvider};
pub use sandbox::SandboxProvider;
