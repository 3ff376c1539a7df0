//! Cancellation plumbing shared by the controller, poller and manager.

use std::future::Future;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineResult};

/// Run `fut` unless `cancel` fires first. A cancelled future is dropped,
/// which stops the provider call it wraps.
pub(crate) async fn cancellable<T, E, F>(cancel: &CancellationToken, fut: F) -> EngineResult<T>
where
    F: Future<Output = Result<T, E>>,
    EngineError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        result = fut => result.map_err(EngineError::from),
    }
}

/// A worker task panicked or was aborted before reporting.
pub(crate) fn join_failure(err: JoinError) -> EngineError {
    if err.is_cancelled() {
        EngineError::Cancelled
    } else {
        EngineError::Invariant(format!("worker task failed: {err}"))
    }
}
