//! Error types shared by the Shoal core.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A capacity envelope or option failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Code reached a state its own rules say is impossible.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("config error: {0}")]
    Config(String),
}
