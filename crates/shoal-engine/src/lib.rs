//! shoal-engine: reconciliation engine for scaling groups.
//!
//! Converges the live instance set of each group toward its declared
//! `desired` count and reports aggregate status.
//!
//! # Architecture
//!
//! ```text
//! GroupManager (create / set_desired / delete / list)
//!   ├── GroupStore        (persisted records, injected)
//!   ├── ComputeProvider   (instance API, injected)
//!   ├── ScalingController (diff actual vs desired, fan-out creates,
//!   │                      sequential deletes)
//!   └── ConvergencePoller (refresh → derive → compare, on an interval,
//!                          raced against a deadline)
//! ```
//!
//! Every long-running call takes a [`CancellationToken`]. Timeouts cancel
//! the work they bound: spawned provider calls are cancelled and aborted
//! rather than left running in the background.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod error;
pub mod manager;
pub mod poller;
mod refresh;
pub mod scaler;
pub mod settings;
mod task;

pub use error::{EngineError, EngineResult};
pub use manager::{CreateGroupOptions, GroupManager};
pub use poller::ConvergencePoller;
pub use scaler::{ScaleAction, ScaleReport, ScalingController};
pub use settings::{EngineSettings, InstanceDefaults};
pub use tokio_util::sync::CancellationToken;
