use crate::backfill::BackfillReport;
use crate::error::Result;
use crate::repository::Resolution;
use async_trait::async_trait;
use snip_core::UrlMapping;

/// Operations offered to the HTTP layer and the CLI.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Returns the short id for `url`, creating a mapping if none exists.
    async fn shorten(&self, url: &str) -> Result<Resolution>;

    /// Returns the mapping stored under `short_id`.
    async fn resolve(&self, short_id: &str) -> Result<UrlMapping>;

    /// Rebuilds the reverse index of the currently selected store.
    async fn run_backfill(&self) -> Result<BackfillReport>;
}
