//! Provider gateway error types.

use thiserror::Error;

/// Errors surfaced by a compute provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The named snapshot or instance does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider rejected or failed the call.
    #[error("provider api error: {0}")]
    Api(String),

    #[error("provider state error: {0}")]
    State(#[from] shoal_state::StateError),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
