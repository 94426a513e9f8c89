use crate::backfill::{backfill, BackfillReport};
use crate::error::{Result, ShortenerError};
use crate::repository::{RepositoryOptions, Resolution, UrlMappingRepository};
use crate::shortener::Shortener;
use async_trait::async_trait;
use snip_core::mapping::validate_url;
use snip_core::{ShortId, StoreError, StoreHandle, UrlMapping};
use snip_generator::Generator;
use snip_store::BackendSelector;
use std::sync::Arc;
use tracing::debug;

/// A concrete implementation of the [`Shortener`] trait.
///
/// Each call acquires a store from the selector, so a backend that comes
/// back after an outage is picked up by the next request.
#[derive(Debug)]
pub struct ShortenerService<G> {
    selector: Arc<BackendSelector>,
    repository: UrlMappingRepository<G>,
}

impl<G> Clone for ShortenerService<G> {
    fn clone(&self) -> Self {
        Self {
            selector: Arc::clone(&self.selector),
            repository: self.repository.clone(),
        }
    }
}

impl<G: Generator> ShortenerService<G> {
    pub fn new(selector: BackendSelector, generator: G) -> Self {
        Self::with_options(selector, generator, RepositoryOptions::default())
    }

    pub fn with_options(
        selector: BackendSelector,
        generator: G,
        options: RepositoryOptions,
    ) -> Self {
        Self {
            selector: Arc::new(selector),
            repository: UrlMappingRepository::with_options(generator, options),
        }
    }

    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    pub fn repository(&self) -> &UrlMappingRepository<G> {
        &self.repository
    }

    async fn acquire(&self) -> Result<StoreHandle> {
        let handle = self
            .selector
            .acquire_store()
            .await
            .map_err(selector_error)?;
        debug!(backend = %handle.kind(), "Acquired store");
        Ok(handle)
    }
}

#[async_trait]
impl<G: Generator> Shortener for ShortenerService<G> {
    async fn shorten(&self, url: &str) -> Result<Resolution> {
        // Reject before touching any backend, probes included.
        validate_url(url)?;

        let handle = self.acquire().await?;
        self.repository.resolve_or_create(handle.store(), url).await
    }

    async fn resolve(&self, short_id: &str) -> Result<UrlMapping> {
        if ShortId::new(short_id).is_err() {
            return Err(ShortenerError::NotFound(short_id.to_string()));
        }

        let handle = self.acquire().await?;
        self.repository.lookup(handle.store(), short_id).await
    }

    async fn run_backfill(&self) -> Result<BackfillReport> {
        let handle = self.acquire().await?;
        Ok(backfill(handle.store()).await?)
    }
}

fn selector_error(e: StoreError) -> ShortenerError {
    match e {
        StoreError::Unavailable(message) => ShortenerError::StoreUnavailable(message),
        other => ShortenerError::Store(other),
    }
}
