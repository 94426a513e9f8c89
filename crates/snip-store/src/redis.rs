use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use snip_core::store::Result;
use snip_core::{KeyValueStore, ScanPage, StoreError};
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

/// `COUNT` hint passed to `SCAN`.
pub const DEFAULT_SCAN_COUNT: usize = 100;

fn map_redis_error(operation: &str, err: redis::RedisError) -> StoreError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() || message.to_ascii_lowercase().contains("timed out") {
        StoreError::Timeout(message)
    } else if err.is_connection_refusal() || err.is_io_error() {
        StoreError::Unavailable(message)
    } else {
        StoreError::Operation(message)
    }
}

/// Parses a `SCAN` cursor; `0` marks the end of the iteration.
fn next_cursor(cursor: u64) -> Option<String> {
    (cursor != 0).then(|| cursor.to_string())
}

/// A Redis-backed implementation of [`KeyValueStore`].
///
/// The connection is opened lazily on first use and then reused; the
/// connection manager reconnects transparently after a dropped connection.
/// Connection attempts are not retried, so an unreachable server fails the
/// call at once and the selector can fall back without waiting out a backoff.
/// Keys are stored verbatim with no prefix so that other tools reading the
/// same database see the shared key layout.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    scan_count: usize,
}

impl RedisStore {
    /// Creates a store for the given `redis://` URL without connecting.
    pub fn open(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            StoreError::Unavailable(format!("invalid redis url '{redis_url}': {e}"))
        })?;

        Ok(Self {
            client,
            conn: OnceCell::new(),
            scan_count: DEFAULT_SCAN_COUNT,
        })
    }

    /// Creates a store from an established connection manager.
    pub fn with_connection(client: redis::Client, conn: ConnectionManager) -> Self {
        Self {
            client,
            conn: OnceCell::new_with(Some(conn)),
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }

    /// Overrides the `COUNT` hint used by scans.
    pub fn with_scan_count(mut self, scan_count: usize) -> Self {
        self.scan_count = scan_count.max(1);
        self
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                debug!("Opening Redis connection");
                let config = ConnectionManagerConfig::new().set_number_of_retries(0);
                ConnectionManager::new_with_config(self.client.clone(), config)
                    .await
                    .map_err(|e| map_redis_error("failed to connect to Redis", e))
            })
            .await?;
        Ok(conn.clone())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.conn.initialized())
            .field("scan_count", &self.scan_count)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to ping Redis", e))?;

        if reply.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(StoreError::InvalidData(format!(
                "unexpected PING reply from Redis: {reply}"
            )))
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        trace!(key, "Fetching value from Redis");

        let mut conn = self.connection().await?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => {
                trace!(key, hit = value.is_some(), "Redis get finished");
                Ok(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Redis error on get");
                Err(map_redis_error("failed to fetch value from Redis", e))
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        trace!(key, "Storing value in Redis");

        let mut conn = self.connection().await?;
        match conn.set::<_, _, ()>(key, value).await {
            Ok(()) => {
                debug!(key, "Stored value in Redis");
                Ok(())
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to store value in Redis");
                Err(map_redis_error("failed to write value to Redis", e))
            }
        }
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        trace!(key, "Storing value in Redis if absent");

        let mut conn = self.connection().await?;
        match conn.set_nx::<_, _, bool>(key, value).await {
            Ok(written) => {
                debug!(key, written, "Conditional write to Redis finished");
                Ok(written)
            }
            Err(e) => {
                warn!(key, error = %e, "Failed conditional write to Redis");
                Err(map_redis_error("failed to write value to Redis", e))
            }
        }
    }

    async fn scan_page(&self, cursor: Option<String>) -> Result<ScanPage> {
        let cursor = match cursor {
            None => 0,
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                StoreError::InvalidData(format!("invalid Redis scan cursor '{raw}': {e}"))
            })?,
        };

        let mut conn = self.connection().await?;
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("COUNT")
            .arg(self.scan_count)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to scan Redis keys", e))?;

        trace!(cursor, next, count = keys.len(), "Scanned Redis page");
        Ok(ScanPage {
            keys,
            next: next_cursor(next),
        })
    }
}
