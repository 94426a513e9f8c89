use clap::{Parser, Subcommand, ValueEnum};
use snip_telemetry::LogFormat;
use std::fmt::{Display, Formatter};

pub const REST_URL_ENV: &str = "KV_REST_API_URL";
pub const REST_TOKEN_ENV: &str = "KV_REST_API_TOKEN";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const STORE_TIMEOUT_ENV: &str = "SNIP_STORE_TIMEOUT_MS";
pub const PROBE_TIMEOUT_ENV: &str = "SNIP_PROBE_TIMEOUT_MS";
pub const DISABLE_MEMORY_FALLBACK_ENV: &str = "SNIP_DISABLE_MEMORY_FALLBACK";
pub const ID_BYTES_ENV: &str = "SNIP_ID_BYTES";
pub const STRICT_DEDUP_ENV: &str = "SNIP_STRICT_DEDUP";
pub const LOG_FORMAT_ENV: &str = "SNIP_LOG_FORMAT";

pub const DEFAULT_STORE_TIMEOUT_MS: &str = "2000";
pub const DEFAULT_PROBE_TIMEOUT_MS: &str = "500";
pub const DEFAULT_ID_BYTES: &str = "4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormatArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormatArg::Text => write!(f, "text"),
            LogFormatArg::Json => write!(f, "json"),
        }
    }
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a URL, reusing the existing id if it was shortened before.
    Shorten { url: String },
    /// Print the mapping stored under a short id.
    Resolve { id: String },
    /// Rebuild the reverse index from the forward mappings.
    Backfill,
    /// Probe every configured backend and report which one would be used.
    Probe,
}

#[derive(Debug, Parser)]
#[command(name = "snip", about = "URL shortener backed by a key-value store")]
pub struct CLI {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, env = REST_URL_ENV, requires = "rest_token")]
    pub rest_url: Option<String>,

    #[arg(long, env = REST_TOKEN_ENV, hide_env_values = true, requires = "rest_url")]
    pub rest_token: Option<String>,

    #[arg(long, env = REDIS_URL_ENV)]
    pub redis_url: Option<String>,

    #[arg(long, env = STORE_TIMEOUT_ENV, default_value = DEFAULT_STORE_TIMEOUT_MS)]
    pub store_timeout_ms: u64,

    #[arg(long, env = PROBE_TIMEOUT_ENV, default_value = DEFAULT_PROBE_TIMEOUT_MS)]
    pub probe_timeout_ms: u64,

    #[arg(long, env = DISABLE_MEMORY_FALLBACK_ENV)]
    pub disable_memory_fallback: bool,

    #[arg(long, env = ID_BYTES_ENV, default_value = DEFAULT_ID_BYTES)]
    pub id_bytes: usize,

    #[arg(long, env = STRICT_DEDUP_ENV)]
    pub strict_dedup: bool,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,
}
