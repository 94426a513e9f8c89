use serde::Serialize;
use snip_core::mapping::decode_reverse_value;
use snip_core::store::Result;
use snip_core::{is_reverse_key, reverse_key, KeyValueStore, ShortId, StoreError, UrlMapping};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Counters produced by one [`backfill`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Keys returned by the scan, reverse entries included.
    pub scanned: usize,
    /// Forward mappings that were read and decoded.
    pub mappings: usize,
    /// Reverse entries created or overwritten.
    pub written: usize,
    /// Reverse entries that already named the canonical id.
    pub unchanged: usize,
    /// Keys that vanished, could not be read, or held a corrupt value.
    pub skipped: usize,
}

/// Rebuilds the reverse index from the forward mappings in `store`.
///
/// Re-running it on an unchanged store writes nothing. When several forward
/// mappings share a URL, the id the reverse entry already names is kept if it
/// is one of them; otherwise the earliest-created mapping wins.
///
/// A key that cannot be read or decoded is skipped. Only errors meaning the
/// backend itself is gone ([`StoreError::Unavailable`], [`StoreError::Timeout`])
/// abort the run.
pub async fn backfill(store: &dyn KeyValueStore) -> Result<BackfillReport> {
    let keys = store.scan_keys().await?;
    let mut report = BackfillReport {
        scanned: keys.len(),
        ..Default::default()
    };

    let mut by_url: HashMap<String, Vec<UrlMapping>> = HashMap::new();
    for key in keys.iter().filter(|key| !is_reverse_key(key)) {
        let value = match store.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(key = %key, "Key disappeared during backfill");
                report.skipped += 1;
                continue;
            }
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                warn!(key = %key, error = %e, "Skipping unreadable key");
                report.skipped += 1;
                continue;
            }
        };

        match UrlMapping::from_value(key, &value) {
            Ok(mapping) if mapping.short_id.as_str() != key.as_str() => {
                warn!(
                    key = %key,
                    short_id = %mapping.short_id,
                    "Skipping mapping stored under a different key"
                );
                report.skipped += 1;
            }
            Ok(mapping) => {
                report.mappings += 1;
                by_url
                    .entry(mapping.original_url.clone())
                    .or_default()
                    .push(mapping);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Skipping corrupt mapping");
                report.skipped += 1;
            }
        }
    }

    for (url, mappings) in by_url {
        let reverse = reverse_key(&url);
        let current = match store.get(&reverse).await {
            Ok(Some(value)) => match decode_reverse_value(&reverse, &value) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(key = %reverse, error = %e, "Replacing corrupt reverse entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                warn!(key = %reverse, error = %e, "Skipping unreadable reverse entry");
                report.skipped += 1;
                continue;
            }
        };

        let Some(canonical) = canonical_id(current.as_ref(), &mappings) else {
            continue;
        };
        if current.as_ref() == Some(canonical) {
            report.unchanged += 1;
            continue;
        }

        store.set(&reverse, canonical.as_str()).await?;
        debug!(key = %reverse, short_id = %canonical, "Wrote reverse entry");
        report.written += 1;
    }

    info!(
        scanned = report.scanned,
        mappings = report.mappings,
        written = report.written,
        unchanged = report.unchanged,
        skipped = report.skipped,
        "Reverse index backfill finished"
    );
    Ok(report)
}

/// Errors after which no further store call can succeed.
fn is_fatal(e: &StoreError) -> bool {
    matches!(e, StoreError::Unavailable(_) | StoreError::Timeout(_))
}

fn canonical_id<'a>(
    current: Option<&ShortId>,
    mappings: &'a [UrlMapping],
) -> Option<&'a ShortId> {
    if let Some(found) = current.and_then(|id| mappings.iter().find(|m| &m.short_id == id)) {
        return Some(&found.short_id);
    }

    mappings
        .iter()
        .min_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.short_id.cmp(&b.short_id))
        })
        .map(|earliest| &earliest.short_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jiff::Timestamp;
    use snip_core::ScanPage;
    use snip_store::MemoryStore;

    /// A memory store whose `get` fails for one chosen key.
    struct FailingKeyStore {
        inner: MemoryStore,
        failing_key: String,
        error: StoreError,
    }

    #[async_trait]
    impl KeyValueStore for FailingKeyStore {
        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            if key == self.failing_key {
                return Err(self.error.clone());
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value).await
        }

        async fn scan_page(&self, cursor: Option<String>) -> Result<ScanPage> {
            self.inner.scan_page(cursor).await
        }
    }

    async fn store_with_three_mappings() -> MemoryStore {
        let store = MemoryStore::new();
        for (i, id) in ["aaaaaaaa", "bbbbbbbb", "cccccccc"].into_iter().enumerate() {
            put(&store, &mapping_at(&format!("https://example.com/{i}"), id, 100)).await;
        }
        store.set("hashkey0", "").await.unwrap();
        store
    }

    fn mapping_at(url: &str, id: &str, seconds: i64) -> UrlMapping {
        UrlMapping {
            original_url: url.to_string(),
            short_id: ShortId::new(id).unwrap(),
            created_at: Timestamp::from_second(seconds).unwrap(),
        }
    }

    async fn put(store: &MemoryStore, mapping: &UrlMapping) {
        store
            .set(mapping.short_id.as_str(), &mapping.to_value().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn creates_one_entry_per_mapping_then_nothing() {
        let store = MemoryStore::with_page_size(3);
        for i in 0..10 {
            let mapping = mapping_at(
                &format!("https://example.com/{i}"),
                &format!("{i:08x}"),
                1_700_000_000,
            );
            put(&store, &mapping).await;
        }

        let first = backfill(&store).await.unwrap();
        assert_eq!(first.scanned, 10);
        assert_eq!(first.mappings, 10);
        assert_eq!(first.written, 10);
        assert_eq!(first.unchanged, 0);

        for i in 0..10 {
            let value = store
                .get(&reverse_key(&format!("https://example.com/{i}")))
                .await
                .unwrap();
            assert_eq!(value, Some(format!("{i:08x}")));
        }

        let second = backfill(&store).await.unwrap();
        assert_eq!(second.scanned, 20);
        assert_eq!(second.mappings, 10);
        assert_eq!(second.written, 0);
        assert_eq!(second.unchanged, 10);
        assert_eq!(store.len(), 20);
    }

    #[tokio::test]
    async fn repairs_stale_reverse_entry() {
        let store = MemoryStore::new();
        put(&store, &mapping_at("https://example.com/a", "aaaaaaaa", 100)).await;
        store
            .set(&reverse_key("https://example.com/a"), "gone0000")
            .await
            .unwrap();

        let report = backfill(&store).await.unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(
            store
                .get(&reverse_key("https://example.com/a"))
                .await
                .unwrap()
                .as_deref(),
            Some("aaaaaaaa")
        );
    }

    #[tokio::test]
    async fn duplicate_urls_prefer_earliest_mapping() {
        let store = MemoryStore::new();
        put(&store, &mapping_at("https://example.com/a", "bbbbbbbb", 200)).await;
        put(&store, &mapping_at("https://example.com/a", "cccccccc", 100)).await;
        put(&store, &mapping_at("https://example.com/a", "aaaaaaaa", 300)).await;

        let report = backfill(&store).await.unwrap();
        assert_eq!(report.mappings, 3);
        assert_eq!(report.written, 1);
        assert_eq!(
            store
                .get(&reverse_key("https://example.com/a"))
                .await
                .unwrap()
                .as_deref(),
            Some("cccccccc")
        );
    }

    #[tokio::test]
    async fn duplicate_urls_keep_current_reverse_entry() {
        let store = MemoryStore::new();
        put(&store, &mapping_at("https://example.com/a", "bbbbbbbb", 200)).await;
        put(&store, &mapping_at("https://example.com/a", "cccccccc", 100)).await;
        store
            .set(&reverse_key("https://example.com/a"), "\"bbbbbbbb\"")
            .await
            .unwrap();

        let report = backfill(&store).await.unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.unchanged, 1);
    }

    #[tokio::test]
    async fn corrupt_values_are_skipped() {
        let store = MemoryStore::new();
        put(&store, &mapping_at("https://example.com/a", "aaaaaaaa", 100)).await;
        store.set("broken00", "{not json").await.unwrap();
        store.set("plain", "just a string").await.unwrap();

        let report = backfill(&store).await.unwrap();
        assert_eq!(report.mappings, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.written, 1);
    }

    #[tokio::test]
    async fn corrupt_reverse_entry_is_replaced() {
        let store = MemoryStore::new();
        put(&store, &mapping_at("https://example.com/a", "aaaaaaaa", 100)).await;
        store
            .set(&reverse_key("https://example.com/a"), "not:an:id")
            .await
            .unwrap();

        let report = backfill(&store).await.unwrap();
        assert_eq!(report.written, 1);
    }

    #[tokio::test]
    async fn reverse_keys_are_not_treated_as_mappings() {
        let store = MemoryStore::new();
        store
            .set(
                "url:0000",
                &mapping_at("https://example.com/x", "aaaaaaaa", 1)
                    .to_value()
                    .unwrap(),
            )
            .await
            .unwrap();

        let report = backfill(&store).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.mappings, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.written, 0);
    }

    #[tokio::test]
    async fn unreadable_key_is_skipped() {
        let store = FailingKeyStore {
            inner: store_with_three_mappings().await,
            failing_key: "hashkey0".to_string(),
            error: StoreError::Operation(
                "WRONGTYPE Operation against a key holding the wrong kind of value".into(),
            ),
        };

        let report = backfill(&store).await.unwrap();
        assert_eq!(report.mappings, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.written, 3);
        for (i, id) in ["aaaaaaaa", "bbbbbbbb", "cccccccc"].into_iter().enumerate() {
            let value = store
                .get(&reverse_key(&format!("https://example.com/{i}")))
                .await
                .unwrap();
            assert_eq!(value.as_deref(), Some(id));
        }
    }

    #[tokio::test]
    async fn unreadable_reverse_entry_is_skipped() {
        let store = FailingKeyStore {
            inner: store_with_three_mappings().await,
            failing_key: reverse_key("https://example.com/1"),
            error: StoreError::Operation("WRONGTYPE".into()),
        };

        let report = backfill(&store).await.unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn unavailable_backend_aborts() {
        for error in [
            StoreError::Unavailable("connection refused".into()),
            StoreError::Timeout("get did not complete".into()),
        ] {
            let store = FailingKeyStore {
                inner: store_with_three_mappings().await,
                failing_key: "hashkey0".to_string(),
                error,
            };

            let err = backfill(&store).await.unwrap_err();
            assert!(matches!(
                err,
                StoreError::Unavailable(_) | StoreError::Timeout(_)
            ));
        }
    }

    #[tokio::test]
    async fn mapping_under_foreign_key_is_skipped() {
        let store = MemoryStore::new();
        let mapping = mapping_at("https://example.com/a", "bbbbbbbb", 100);
        store
            .set("aaaaaaaa", &mapping.to_value().unwrap())
            .await
            .unwrap();

        let report = backfill(&store).await.unwrap();
        assert_eq!(report.mappings, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.written, 0);
        assert!(store
            .get(&reverse_key("https://example.com/a"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn empty_store_is_a_no_op() {
        let report = backfill(&MemoryStore::new()).await.unwrap();
        assert_eq!(report, BackfillReport::default());
    }

    #[test]
    fn canonical_falls_back_when_current_is_foreign() {
        let mappings = vec![
            mapping_at("https://example.com/a", "bbbbbbbb", 100),
            mapping_at("https://example.com/a", "aaaaaaaa", 100),
        ];
        let foreign = ShortId::new("zzzzzzzz").unwrap();

        assert_eq!(
            canonical_id(Some(&foreign), &mappings).map(ShortId::as_str),
            Some("aaaaaaaa")
        );
        assert_eq!(
            canonical_id(None, &mappings).map(ShortId::as_str),
            Some("aaaaaaaa")
        );
        assert!(canonical_id(None, &[]).is_none());
    }
}
