use thiserror::Error;

/// Errors related to the core domain types of the URL shortener.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by a [`KeyValueStore`](crate::store::KeyValueStore) backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("store serialization failed: {0}")]
    Serialization(String),
    #[error("stored value is invalid: {0}")]
    InvalidData(String),
    #[error("short id collision could not be resolved: {0}")]
    Collision(String),
    #[error("store operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short id: {0}")]
    InvalidShortId(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}
