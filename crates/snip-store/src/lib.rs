//! Key-value store backends and backend selection for snip.
//!
//! Three [`KeyValueStore`](snip_core::KeyValueStore) implementations are
//! provided: a managed REST key-value service ([`RestKvStore`]), a Redis
//! server ([`RedisStore`]), and a process-local map ([`MemoryStore`]).
//! [`BackendSelector`] picks the first reachable one for every operation.
//!
//! # Example
//!
//! ```rust
//! use snip_core::BackendKind;
//! use snip_store::{BackendSelector, StorageConfig};
//!
//! # async fn example() -> Result<(), snip_core::StoreError> {
//! let selector = BackendSelector::from_config(&StorageConfig::default())?;
//! let handle = selector.acquire_store().await?;
//! assert_eq!(handle.kind(), BackendKind::Memory);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod memory;
pub mod redis;
pub mod rest;
pub mod selector;
pub mod timeout;

pub use config::{RestConfig, StorageConfig};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;
pub use rest::RestKvStore;
pub use selector::{BackendSelector, Probe};
pub use timeout::TimeoutStore;
