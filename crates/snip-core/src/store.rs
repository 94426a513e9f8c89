use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, StoreError>;

/// One page of a key enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Keys returned by this page. May repeat keys seen on earlier pages.
    pub keys: Vec<String>,
    /// Cursor for the next page, or `None` once enumeration is complete.
    pub next: Option<String>,
}

impl ScanPage {
    /// A page that ends the enumeration.
    pub fn last(keys: Vec<String>) -> Self {
        Self { keys, next: None }
    }
}

/// Which kind of backend a store handle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// A managed key-value service reached over its REST API.
    Rest,
    /// A Redis-compatible cache server.
    Redis,
    /// The process-local fallback map.
    Memory,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Rest => write!(f, "rest"),
            BackendKind::Redis => write!(f, "redis"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

/// A uniform string key-value interface over the supported backends.
///
/// Values are opaque strings; the repository decides how to interpret them
/// based on the key namespace they were read from.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Liveness probe. `Ok(())` means the backend answered.
    async fn ping(&self) -> Result<()>;

    /// Reads a value. Returns `Ok(None)` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, overwriting any existing one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Writes a value only if the key is absent.
    ///
    /// Returns `true` if the value was written. The default implementation
    /// is a non-atomic read followed by a write; backends with a native
    /// conditional write should override it.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        if self.get(key).await?.is_some() {
            return Ok(false);
        }
        self.set(key, value).await?;
        Ok(true)
    }

    /// Fetches one page of keys starting at `cursor` (`None` for the first page).
    async fn scan_page(&self, cursor: Option<String>) -> Result<ScanPage>;

    /// Enumerates every key in the store.
    ///
    /// Drains the paginated scan to completion and deduplicates keys that a
    /// backend revisits across pages, keeping first-seen order.
    async fn scan_keys(&self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut seen_cursors = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor = None;

        loop {
            let page = self.scan_page(cursor.take()).await?;
            for key in page.keys {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }

            match page.next {
                Some(next) => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(StoreError::InvalidData(format!(
                            "scan cursor '{next}' was returned twice"
                        )));
                    }
                    cursor = Some(next);
                }
                None => return Ok(keys),
            }
        }
    }
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        (**self).set_if_absent(key, value).await
    }

    async fn scan_page(&self, cursor: Option<String>) -> Result<ScanPage> {
        (**self).scan_page(cursor).await
    }

    async fn scan_keys(&self) -> Result<Vec<String>> {
        (**self).scan_keys().await
    }
}

/// A store chosen for one logical operation.
///
/// Handles are cheap to clone and are passed explicitly into repository
/// calls; there is no process-wide client.
#[derive(Clone)]
pub struct StoreHandle {
    kind: BackendKind,
    store: Arc<dyn KeyValueStore>,
}

impl StoreHandle {
    pub fn new(kind: BackendKind, store: Arc<dyn KeyValueStore>) -> Self {
        Self { kind, store }
    }

    /// The kind of backend behind this handle.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// The underlying store.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
