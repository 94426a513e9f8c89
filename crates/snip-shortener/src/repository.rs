use crate::error::{Result, ShortenerError};
use serde::Serialize;
use snip_core::mapping::{decode_reverse_value, validate_url};
use snip_core::{reverse_key, KeyValueStore, ShortId, StoreError, UrlMapping};
use snip_generator::Generator;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

/// Default number of ids tried before giving up on a forward-key collision.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Tunables for [`UrlMappingRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct RepositoryOptions {
    /// How many freshly generated ids to try when the forward key is taken.
    #[builder(default = DEFAULT_MAX_ATTEMPTS, setter(transform = |n: usize| n.max(1)))]
    pub max_attempts: usize,
    /// Write the reverse key only if absent, so concurrent shortening of the
    /// same URL converges on one id.
    #[builder(default = false)]
    pub strict_dedup: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Result of shortening a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub short_id: ShortId,
    /// `true` if the URL had already been shortened and nothing was written.
    pub is_existing: bool,
}

/// Owns the forward (`shortId -> mapping`) and reverse (`url:<hash> -> shortId`)
/// key schemes.
///
/// The store is passed into every call rather than held, so one repository
/// can serve whichever backend the selector picks for each operation.
///
/// Writes are not atomic across the two keys: the forward key is written
/// first, then the reverse key. A failure in between leaves a forward
/// mapping without a reverse entry, which [`backfill`](crate::backfill)
/// repairs.
#[derive(Debug)]
pub struct UrlMappingRepository<G> {
    generator: Arc<G>,
    options: RepositoryOptions,
}

impl<G> Clone for UrlMappingRepository<G> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            options: self.options.clone(),
        }
    }
}

impl<G: Generator> UrlMappingRepository<G> {
    pub fn new(generator: G) -> Self {
        Self::with_options(generator, RepositoryOptions::default())
    }

    pub fn with_options(generator: G, options: RepositoryOptions) -> Self {
        Self {
            generator: Arc::new(generator),
            options,
        }
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    /// Returns the canonical short id for `url`, creating one if needed.
    ///
    /// An existing mapping is returned without any write. Byte-distinct
    /// URLs are distinct; no normalization is applied.
    pub async fn resolve_or_create(
        &self,
        store: &dyn KeyValueStore,
        url: &str,
    ) -> Result<Resolution> {
        validate_url(url)?;

        let reverse = reverse_key(url);
        if let Some(short_id) = self.find_existing(store, &reverse).await? {
            debug!(short_id = %short_id, "URL already shortened");
            return Ok(Resolution {
                short_id,
                is_existing: true,
            });
        }

        let mapping = self.insert_forward(store, url).await?;
        let short_id = mapping.short_id.clone();

        if self.options.strict_dedup {
            if !store.set_if_absent(&reverse, short_id.as_str()).await? {
                if let Some(winner) = self.find_existing(store, &reverse).await? {
                    info!(
                        short_id = %short_id,
                        winner = %winner,
                        "Concurrent shortening of the same URL, keeping the first id"
                    );
                    return Ok(Resolution {
                        short_id: winner,
                        is_existing: true,
                    });
                }
                store.set(&reverse, short_id.as_str()).await?;
            }
        } else {
            store.set(&reverse, short_id.as_str()).await?;
        }

        info!(short_id = %short_id, "Created URL mapping");
        Ok(Resolution {
            short_id,
            is_existing: false,
        })
    }

    /// Reads the forward mapping for `short_id`.
    ///
    /// Strings that are not valid short ids (including reverse-index keys)
    /// are reported as not found without touching the store.
    pub async fn lookup(&self, store: &dyn KeyValueStore, short_id: &str) -> Result<UrlMapping> {
        let id = ShortId::new(short_id)
            .map_err(|_| ShortenerError::NotFound(short_id.to_string()))?;

        let Some(value) = store.get(id.as_str()).await? else {
            trace!(short_id = %id, "No mapping for short id");
            return Err(ShortenerError::NotFound(id.to_string()));
        };

        let mapping = UrlMapping::from_value(id.as_str(), &value).map_err(|e| {
            warn!(short_id = %id, error = %e, "Stored mapping is corrupt");
            ShortenerError::Store(e)
        })?;

        if mapping.short_id != id {
            warn!(short_id = %id, stored = %mapping.short_id, "Mapping names a different id");
            return Err(ShortenerError::Store(StoreError::InvalidData(format!(
                "mapping stored under '{id}' names short id '{}'",
                mapping.short_id
            ))));
        }

        Ok(mapping)
    }

    async fn find_existing(
        &self,
        store: &dyn KeyValueStore,
        reverse: &str,
    ) -> Result<Option<ShortId>> {
        match store.get(reverse).await? {
            Some(value) => Ok(Some(decode_reverse_value(reverse, &value)?)),
            None => Ok(None),
        }
    }

    /// Writes a new forward mapping under a freshly generated id.
    ///
    /// The write only succeeds on an unoccupied key; an occupied key means a
    /// generated id collided with an existing mapping and a new id is drawn.
    async fn insert_forward(&self, store: &dyn KeyValueStore, url: &str) -> Result<UrlMapping> {
        for attempt in 1..=self.options.max_attempts {
            let short_id: ShortId = self.generator.generate().into();
            let mapping = UrlMapping::new(url, short_id);
            let value = mapping.to_value()?;

            if store.set_if_absent(mapping.short_id.as_str(), &value).await? {
                return Ok(mapping);
            }

            warn!(
                short_id = %mapping.short_id,
                attempt,
                "Generated short id is already taken, regenerating"
            );
        }

        Err(ShortenerError::Store(StoreError::Collision(format!(
            "no free short id after {} attempts",
            self.options.max_attempts
        ))))
    }
}
