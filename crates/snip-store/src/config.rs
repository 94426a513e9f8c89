use std::time::Duration;
use typed_builder::TypedBuilder;

/// Default deadline for a single store operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);
/// Default deadline for a liveness probe during backend selection.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Connection settings for a REST key-value service.
#[derive(Clone, TypedBuilder)]
pub struct RestConfig {
    /// Service endpoint, e.g. `https://example.upstash.io`.
    #[builder(setter(into))]
    pub url: String,
    /// Bearer token sent with every command.
    #[builder(setter(into))]
    pub token: String,
}

impl std::fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Which backends the selector may use, in priority order.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use snip_store::StorageConfig;
///
/// let config = StorageConfig::builder()
///     .redis_url("redis://127.0.0.1:6379")
///     .probe_timeout(Duration::from_millis(200))
///     .build();
///
/// assert!(config.rest.is_none());
/// assert!(config.memory_fallback);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct StorageConfig {
    /// Managed REST key-value service, tried first.
    #[builder(default, setter(strip_option))]
    pub rest: Option<RestConfig>,
    /// Redis-compatible cache server, tried second.
    #[builder(default, setter(strip_option, into))]
    pub redis_url: Option<String>,
    /// Deadline applied to every store operation.
    #[builder(default = DEFAULT_OPERATION_TIMEOUT)]
    pub operation_timeout: Duration,
    /// Deadline applied to each liveness probe.
    #[builder(default = DEFAULT_PROBE_TIMEOUT)]
    pub probe_timeout: Duration,
    /// Whether to fall back to the in-process store when nothing else answers.
    #[builder(default = true)]
    pub memory_fallback: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
