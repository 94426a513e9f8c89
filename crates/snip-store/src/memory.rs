use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use snip_core::store::Result;
use snip_core::{KeyValueStore, ScanPage, StoreError};

/// Number of keys returned per scan page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// In-process implementation of [`KeyValueStore`] using DashMap.
///
/// Contents are not shared across processes and are lost on restart.
#[derive(Debug)]
pub struct MemoryStore {
    storage: DashMap<String, String>,
    page_size: usize,
}

impl MemoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates a store whose scans return at most `page_size` keys per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            storage: DashMap::new(),
            page_size: page_size.max(1),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Removes a key, returning `true` if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.storage.remove(key).is_some()
    }

    fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.storage.iter().map(|e| e.key().clone()).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.storage.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        match self.storage.entry(key.to_owned()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(value.to_owned());
                Ok(true)
            }
        }
    }

    /// Pages over a sorted snapshot of the keys; the cursor is an offset.
    ///
    /// Keys inserted between pages may shift offsets, so a later page can
    /// repeat keys. [`KeyValueStore::scan_keys`] deduplicates them.
    async fn scan_page(&self, cursor: Option<String>) -> Result<ScanPage> {
        let offset = match cursor {
            None => 0,
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                StoreError::InvalidData(format!("invalid memory scan cursor '{raw}': {e}"))
            })?,
        };

        let keys = self.sorted_keys();
        let end = (offset + self.page_size).min(keys.len());
        let page = keys.get(offset..end).map(<[String]>::to_vec).unwrap_or_default();
        let next = (end < keys.len()).then(|| end.to_string());

        Ok(ScanPage { keys: page, next })
    }

    /// Takes one sorted snapshot instead of one per page.
    async fn scan_keys(&self) -> Result<Vec<String>> {
        Ok(self.sorted_keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn set_and_get() {
        let store = MemoryStore::new();

        store.set("abc123", "value").await.unwrap();

        assert_eq!(store.get("abc123").await.unwrap().as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let store = MemoryStore::new();

        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites() {
        let store = MemoryStore::new();

        store.set("k", "old").await.unwrap();
        store.set("k", "new").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn set_if_absent_keeps_existing() {
        let store = MemoryStore::new();

        assert!(store.set_if_absent("k", "first").await.unwrap());
        assert!(!store.set_if_absent("k", "second").await.unwrap());

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn scan_pages_through_all_keys() {
        let store = MemoryStore::with_page_size(2);
        for key in ["a", "b", "c", "d", "e"] {
            store.set(key, "v").await.unwrap();
        }

        let first = store.scan_page(None).await.unwrap();
        assert_eq!(first.keys, vec!["a", "b"]);
        assert_eq!(first.next.as_deref(), Some("2"));

        let keys = store.scan_keys().await.unwrap();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn scan_keys_matches_paged_drain() {
        let store = MemoryStore::with_page_size(1);
        for key in ["d", "a", "c", "url:b"] {
            store.set(key, "v").await.unwrap();
        }

        let mut paged = Vec::new();
        let mut cursor = None;
        loop {
            let page = store.scan_page(cursor).await.unwrap();
            paged.extend(page.keys);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(store.scan_keys().await.unwrap(), paged);
        assert_eq!(paged, vec!["a", "c", "d", "url:b"]);
    }

    #[tokio::test]
    async fn scan_empty_store() {
        let store = MemoryStore::new();

        let page = store.scan_page(None).await.unwrap();
        assert!(page.keys.is_empty());
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn scan_rejects_garbage_cursor() {
        let store = MemoryStore::new();

        let err = store.scan_page(Some("abc".into())).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn concurrent_set_if_absent_has_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        for i in 0..16u32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .set_if_absent("contended", &i.to_string())
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }
}
