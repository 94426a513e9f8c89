use snip_core::{CoreError, StoreError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    /// The caller supplied a malformed URL. Nothing was read or written.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// No mapping exists for the requested short id.
    #[error("short id not found: {0}")]
    NotFound(String),
    /// No backend was reachable and the in-process fallback is disabled.
    #[error("no store available: {0}")]
    StoreUnavailable(String),
    /// A reachable backend failed mid-operation or returned malformed data.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidUrl(message) => Self::InvalidInput(message),
            CoreError::InvalidShortId(message) => Self::NotFound(message),
        }
    }
}
