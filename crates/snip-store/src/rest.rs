use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};
use snip_core::store::Result;
use snip_core::{KeyValueStore, ScanPage, StoreError};
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

/// `COUNT` hint passed to `SCAN`.
pub const DEFAULT_SCAN_COUNT: usize = 100;

/// Envelope returned by the REST key-value service for every command.
#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

fn map_reqwest_error(operation: &str, err: reqwest::Error) -> StoreError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        StoreError::Timeout(message)
    } else if err.is_connect() || err.is_request() {
        StoreError::Unavailable(message)
    } else if err.is_decode() {
        StoreError::InvalidData(message)
    } else {
        StoreError::Operation(message)
    }
}

/// Interprets a raw HTTP reply from the service.
fn parse_reply(command: &str, status: reqwest::StatusCode, body: &str) -> Result<Value> {
    let reply: CommandReply = serde_json::from_str(body).map_err(|e| {
        StoreError::InvalidData(format!(
            "{command}: unreadable reply (status {status}): {e}"
        ))
    })?;

    if let Some(error) = reply.error {
        return Err(StoreError::Operation(format!("{command}: {error}")));
    }

    if !status.is_success() {
        return Err(StoreError::Operation(format!(
            "{command}: service returned status {status}"
        )));
    }

    Ok(reply.result.unwrap_or(Value::Null))
}

/// Converts a `GET` result into an optional string value.
fn value_as_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Parses a `SCAN` reply of the form `[cursor, [key, ...]]`.
///
/// The cursor is returned as a string by most deployments and as a number
/// by some; `"0"` and `0` both end the iteration.
fn parse_scan_reply(value: Value) -> Result<ScanPage> {
    let invalid = |detail: &str| StoreError::InvalidData(format!("SCAN: {detail}"));

    let Value::Array(mut parts) = value else {
        return Err(invalid("reply is not an array"));
    };
    if parts.len() != 2 {
        return Err(invalid("reply must have exactly two elements"));
    }
    let keys = parts.pop().unwrap_or(Value::Null);
    let cursor = parts.pop().unwrap_or(Value::Null);

    let cursor = match cursor {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return Err(invalid("cursor is neither a string nor a number")),
    };

    let Value::Array(keys) = keys else {
        return Err(invalid("key list is not an array"));
    };
    let keys = keys
        .into_iter()
        .map(|key| match key {
            Value::String(s) => Ok(s),
            _ => Err(invalid("key is not a string")),
        })
        .collect::<Result<Vec<_>>>()?;

    let next = (cursor != "0").then_some(cursor);
    Ok(ScanPage { keys, next })
}

/// A [`KeyValueStore`] backed by a managed key-value service speaking the
/// Redis-over-REST protocol (Vercel KV, Upstash).
///
/// Each command is a `POST` of a JSON array (`["GET", "key"]`) to the
/// service endpoint, authenticated with a bearer token.
#[derive(Clone)]
pub struct RestKvStore {
    http: reqwest::Client,
    endpoint: Url,
    scan_count: usize,
}

impl RestKvStore {
    /// Creates a client for `endpoint` using `token` as bearer credential.
    ///
    /// `timeout` bounds each HTTP request.
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            StoreError::Unavailable(format!("invalid REST endpoint '{endpoint}': {e}"))
        })?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            StoreError::Unavailable(format!("invalid REST token: {e}"))
        })?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| map_reqwest_error("failed to build REST client", e))?;

        Ok(Self {
            http,
            endpoint,
            scan_count: DEFAULT_SCAN_COUNT,
        })
    }

    /// Overrides the `COUNT` hint used by scans.
    pub fn with_scan_count(mut self, scan_count: usize) -> Self {
        self.scan_count = scan_count.max(1);
        self
    }

    async fn command(&self, args: Value) -> Result<Value> {
        let name = args
            .get(0)
            .and_then(Value::as_str)
            .unwrap_or("command")
            .to_string();
        trace!(command = %name, "Sending command to REST key-value service");

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&args)
            .send()
            .await
            .map_err(|e| {
                warn!(command = %name, error = %e, "REST key-value request failed");
                map_reqwest_error(&name, e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(&name, e))?;

        parse_reply(&name, status, &body)
    }
}

impl std::fmt::Debug for RestKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestKvStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("scan_count", &self.scan_count)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for RestKvStore {
    async fn ping(&self) -> Result<()> {
        match self.command(json!(["PING"])).await? {
            Value::String(reply) if reply.eq_ignore_ascii_case("PONG") => Ok(()),
            other => Err(StoreError::InvalidData(format!(
                "unexpected PING reply: {other}"
            ))),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.command(json!(["GET", key])).await?;
        Ok(value_as_string(value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.command(json!(["SET", key, value])).await?;
        debug!(key, "Stored value in REST key-value service");
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let reply = self.command(json!(["SET", key, value, "NX"])).await?;
        let written = !reply.is_null();
        debug!(key, written, "Conditional write to REST key-value service finished");
        Ok(written)
    }

    async fn scan_page(&self, cursor: Option<String>) -> Result<ScanPage> {
        let cursor = cursor.unwrap_or_else(|| "0".to_string());
        let reply = self
            .command(json!(["SCAN", cursor, "COUNT", self.scan_count]))
            .await?;
        parse_scan_reply(reply)
    }
}
