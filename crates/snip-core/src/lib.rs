//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the domain types shared by the store backends and
//! the shortener service: validated short ids, the forward mapping record,
//! the reverse-index key scheme, and the [`KeyValueStore`] capability.

pub mod error;
pub mod mapping;
pub mod short_id;
pub mod store;

pub use error::{CoreError, StoreError};
pub use mapping::{content_hash, is_reverse_key, reverse_key, UrlMapping, REVERSE_KEY_PREFIX};
pub use short_id::ShortId;
pub use store::{BackendKind, KeyValueStore, ScanPage, StoreHandle};
