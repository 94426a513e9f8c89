use crate::config::StorageConfig;
use crate::memory::MemoryStore;
use crate::redis::RedisStore;
use crate::rest::RestKvStore;
use crate::timeout::TimeoutStore;
use snip_core::store::Result;
use snip_core::{BackendKind, KeyValueStore, StoreError, StoreHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Reachable,
    Unreachable { reason: String },
}

impl Probe {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Probe::Reachable)
    }
}

struct Candidate {
    kind: BackendKind,
    store: Arc<dyn KeyValueStore>,
}

/// Chooses the store that serves each logical operation.
///
/// Configured backends are probed in priority order on every acquisition;
/// the first one that answers wins. When none answer, the process-local
/// [`MemoryStore`] is used instead. Data written there is neither shared
/// with other instances nor kept across restarts.
pub struct BackendSelector {
    candidates: Vec<Candidate>,
    fallback: Option<Arc<MemoryStore>>,
    probe_timeout: Duration,
}

impl BackendSelector {
    /// Creates a selector with no remote backends and an empty in-process
    /// fallback.
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            candidates: Vec::new(),
            fallback: Some(Arc::new(MemoryStore::new())),
            probe_timeout,
        }
    }

    /// Builds the selector described by `config`.
    ///
    /// Remote backends are wrapped in a [`TimeoutStore`] using the configured
    /// operation timeout. No connection is opened here.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let mut selector = Self::new(config.probe_timeout);

        if let Some(rest) = &config.rest {
            let store = RestKvStore::new(&rest.url, &rest.token, config.operation_timeout)?;
            selector = selector.with_backend(
                BackendKind::Rest,
                Arc::new(TimeoutStore::new(store, config.operation_timeout)),
            );
        }

        if let Some(redis_url) = &config.redis_url {
            let store = RedisStore::open(redis_url)?;
            selector = selector.with_backend(
                BackendKind::Redis,
                Arc::new(TimeoutStore::new(store, config.operation_timeout)),
            );
        }

        if !config.memory_fallback {
            selector = selector.without_fallback();
        }

        info!(
            backends = ?selector.configured(),
            memory_fallback = selector.fallback.is_some(),
            "Configured storage backends"
        );
        Ok(selector)
    }

    /// Appends a backend after the ones already configured.
    pub fn with_backend(mut self, kind: BackendKind, store: Arc<dyn KeyValueStore>) -> Self {
        self.candidates.push(Candidate { kind, store });
        self
    }

    /// Disables the in-process fallback.
    pub fn without_fallback(mut self) -> Self {
        self.fallback = None;
        self
    }

    /// Replaces the in-process fallback store.
    pub fn with_fallback(mut self, fallback: Arc<MemoryStore>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// The in-process fallback store, if enabled.
    pub fn fallback(&self) -> Option<&Arc<MemoryStore>> {
        self.fallback.as_ref()
    }

    /// Remote backends in priority order.
    pub fn configured(&self) -> Vec<BackendKind> {
        self.candidates.iter().map(|c| c.kind).collect()
    }

    /// Checks whether `store` answers a ping within the probe timeout.
    pub async fn probe(&self, store: &dyn KeyValueStore) -> Probe {
        match tokio::time::timeout(self.probe_timeout, store.ping()).await {
            Ok(Ok(())) => Probe::Reachable,
            Ok(Err(e)) => Probe::Unreachable {
                reason: e.to_string(),
            },
            Err(_) => Probe::Unreachable {
                reason: format!("no answer within {:?}", self.probe_timeout),
            },
        }
    }

    /// Probes every configured remote backend, in priority order.
    pub async fn probe_all(&self) -> Vec<(BackendKind, Probe)> {
        let mut results = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            results.push((candidate.kind, self.probe(candidate.store.as_ref()).await));
        }
        results
    }

    /// Returns the highest-priority store that is currently reachable.
    ///
    /// Falls back to the in-process store when every remote backend is down.
    /// Fails with [`StoreError::Unavailable`] only when the fallback is
    /// disabled.
    pub async fn acquire_store(&self) -> Result<StoreHandle> {
        for candidate in &self.candidates {
            match self.probe(candidate.store.as_ref()).await {
                Probe::Reachable => {
                    debug!(backend = %candidate.kind, "Selected storage backend");
                    return Ok(StoreHandle::new(candidate.kind, candidate.store.clone()));
                }
                Probe::Unreachable { reason } => {
                    warn!(backend = %candidate.kind, %reason, "Storage backend unreachable");
                }
            }
        }

        match &self.fallback {
            Some(memory) => {
                if !self.candidates.is_empty() {
                    warn!("No remote backend reachable, using in-process fallback store");
                }
                let store: Arc<dyn KeyValueStore> = memory.clone();
                Ok(StoreHandle::new(BackendKind::Memory, store))
            }
            None => Err(StoreError::Unavailable(format!(
                "no storage backend reachable (tried {:?}) and in-process fallback is disabled",
                self.configured()
            ))),
        }
    }
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelector")
            .field("backends", &self.configured())
            .field("memory_fallback", &self.fallback.is_some())
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}
