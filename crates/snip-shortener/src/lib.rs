//! URL mapping and deduplication on top of a pluggable key-value store.
//!
//! [`ShortenerService`] picks a backend through a
//! [`BackendSelector`](snip_store::BackendSelector) on every call and hands it
//! to the [`UrlMappingRepository`], which owns the forward and reverse key
//! schemes.

pub mod backfill;
pub mod error;
pub mod repository;
pub mod service;
pub mod shortener;

pub use backfill::{backfill, BackfillReport};
pub use error::ShortenerError;
pub use repository::{RepositoryOptions, Resolution, UrlMappingRepository};
pub use service::ShortenerService;
pub use shortener::Shortener;
