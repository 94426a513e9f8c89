use async_trait::async_trait;
use snip_core::store::Result;
use snip_core::{KeyValueStore, ScanPage, StoreError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// A store decorator that bounds every call with a deadline.
///
/// An elapsed deadline surfaces as [`StoreError::Timeout`]; the call is
/// not retried.
#[derive(Debug, Clone)]
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "Store call timed out");
                Err(StoreError::Timeout(format!(
                    "{operation} did not complete within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for TimeoutStore<S> {
    async fn ping(&self) -> Result<()> {
        self.bounded("ping", self.inner.ping()).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.bounded("set", self.inner.set(key, value)).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.bounded("set_if_absent", self.inner.set_if_absent(key, value))
            .await
    }

    async fn scan_page(&self, cursor: Option<String>) -> Result<ScanPage> {
        self.bounded("scan_page", self.inner.scan_page(cursor)).await
    }
}
