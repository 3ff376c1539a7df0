//! Engine error taxonomy.

use std::time::Duration;

use thiserror::Error;

use shoal_core::CoreError;
use shoal_provider::ProviderError;
use shoal_state::StateError;

/// Errors returned by the reconciliation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Capacity envelope or options rejected. Nothing was changed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Named group or snapshot does not exist. Nothing was changed.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider failed a call; surfaced as-is, never retried.
    #[error("provider error: {0}")]
    Provider(ProviderError),

    #[error("timed out after {after:?} {operation}")]
    Timeout { operation: String, after: Duration },

    /// A code path its own rules say is unreachable was reached.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("metadata store error: {0}")]
    Store(StateError),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) | CoreError::Config(msg) => EngineError::Validation(msg),
            CoreError::Invariant(msg) => EngineError::Invariant(msg),
        }
    }
}

impl From<StateError> for EngineError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(what) => EngineError::NotFound(what),
            other => EngineError::Store(other),
        }
    }
}

impl From<ProviderError> for EngineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(what) => EngineError::NotFound(what),
            ProviderError::State(state) => EngineError::from(state),
            other => EngineError::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_preserved_across_layers() {
        let from_store = EngineError::from(StateError::NotFound("group web".to_string()));
        assert!(matches!(from_store, EngineError::NotFound(ref w) if w == "group web"));

        let from_provider = EngineError::from(ProviderError::NotFound("snapshot base".to_string()));
        assert!(matches!(from_provider, EngineError::NotFound(_)));

        let nested = EngineError::from(ProviderError::State(StateError::NotFound("x".to_string())));
        assert!(matches!(nested, EngineError::NotFound(_)));
    }

    #[test]
    fn provider_failures_are_wrapped_verbatim() {
        let err = EngineError::from(ProviderError::Api("quota exceeded".to_string()));
        assert!(matches!(err, EngineError::Provider(_)));
        assert_eq!(err.to_string(), "provider error: provider api error: quota exceeded");
    }

    #[test]
    fn core_errors_map_to_taxonomy() {
        assert!(matches!(
            EngineError::from(CoreError::Validation("min".to_string())),
            EngineError::Validation(_)
        ));
        assert!(matches!(
            EngineError::from(CoreError::Invariant("count".to_string())),
            EngineError::Invariant(_)
        ));
    }

    #[test]
    fn timeout_message_names_the_operation() {
        let err = EngineError::Timeout {
            operation: "waiting for group web to reach ok".to_string(),
            after: Duration::from_secs(300),
        };
        assert_eq!(err.to_string(), "timed out after 300s waiting for group web to reach ok");
    }
}
