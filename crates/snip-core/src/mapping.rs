use crate::error::{CoreError, StoreError};
use crate::short_id::ShortId;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix of every reverse-index key.
pub const REVERSE_KEY_PREFIX: &str = "url:";

/// A stored forward mapping from a short id to the original URL.
///
/// Mappings are created once and never mutated. The JSON form uses
/// camelCase field names and is shared with other tools reading the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlMapping {
    /// The original URL, byte-for-byte as submitted.
    pub original_url: String,
    /// The short id this mapping is stored under.
    pub short_id: ShortId,
    /// When the mapping was created.
    pub created_at: Timestamp,
}

impl UrlMapping {
    pub fn new(original_url: impl Into<String>, short_id: ShortId) -> Self {
        Self {
            original_url: original_url.into(),
            short_id,
            created_at: Timestamp::now(),
        }
    }

    /// Serializes the mapping into the value stored under its forward key.
    pub fn to_value(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|e| {
            StoreError::Serialization(format!(
                "failed to serialize mapping '{}': {e}",
                self.short_id
            ))
        })
    }

    /// Parses a value read from a forward key.
    pub fn from_value(key: &str, value: &str) -> Result<Self, StoreError> {
        serde_json::from_str(value).map_err(|e| {
            StoreError::InvalidData(format!("invalid mapping stored under '{key}': {e}"))
        })
    }

    /// The reverse-index key for this mapping's URL.
    pub fn reverse_key(&self) -> String {
        reverse_key(&self.original_url)
    }
}

/// Lowercase hex SHA-256 digest of the exact URL bytes.
///
/// No normalization is applied: URLs differing only in case, whitespace,
/// trailing slash, or query order hash differently.
pub fn content_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Builds the reverse-index key (`url:<hex digest>`) for a URL.
pub fn reverse_key(url: &str) -> String {
    format!("{REVERSE_KEY_PREFIX}{}", content_hash(url))
}

/// Returns `true` if `key` belongs to the reverse-index namespace.
pub fn is_reverse_key(key: &str) -> bool {
    key.starts_with(REVERSE_KEY_PREFIX)
}

/// Parses the short id stored under a reverse key.
///
/// Some clients store strings JSON-encoded (`"abcd1234"`), so a quoted
/// value is unwrapped before validation.
pub fn decode_reverse_value(key: &str, value: &str) -> Result<ShortId, StoreError> {
    let raw = match serde_json::from_str::<String>(value) {
        Ok(unquoted) => unquoted,
        Err(_) => value.to_string(),
    };

    ShortId::new(raw).map_err(|e| {
        StoreError::InvalidData(format!("invalid short id stored under '{key}': {e}"))
    })
}

/// Validates that `url` is a syntactically well-formed absolute URL.
pub fn validate_url(url: &str) -> Result<(), CoreError> {
    if url.is_empty() {
        return Err(CoreError::InvalidUrl("URL cannot be empty".to_string()));
    }

    url::Url::parse(url)
        .map(|_| ())
        .map_err(|e| CoreError::InvalidUrl(format!("'{url}' is not an absolute URL: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_key_layout() {
        let key = reverse_key("https://example.com/a");
        assert!(key.starts_with("url:"));
        assert_eq!(key.len(), REVERSE_KEY_PREFIX.len() + 64);
        assert!(key[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn content_hash_known_digest() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn content_hash_is_byte_exact() {
        let base = content_hash("https://example.com/a");
        assert_eq!(base, content_hash("https://example.com/a"));
        assert_ne!(base, content_hash("https://example.com/a/"));
        assert_ne!(base, content_hash("https://EXAMPLE.com/a"));
        assert_ne!(base, content_hash(" https://example.com/a"));
    }

    #[test]
    fn mapping_json_uses_camel_case() {
        let mapping = UrlMapping::new(
            "https://example.com",
            ShortId::new("deadbeef").unwrap(),
        );
        let value = mapping.to_value().unwrap();
        assert!(value.contains("\"originalUrl\":\"https://example.com\""));
        assert!(value.contains("\"shortId\":\"deadbeef\""));
        assert!(value.contains("\"createdAt\""));

        let parsed = UrlMapping::from_value("deadbeef", &value).unwrap();
        assert_eq!(parsed, mapping);
    }

    #[test]
    fn corrupt_mapping_is_invalid_data() {
        let err = UrlMapping::from_value("abc", "{not json").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));

        let err = UrlMapping::from_value("abc", "\"just a string\"").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[test]
    fn reverse_value_raw_and_quoted() {
        assert_eq!(
            decode_reverse_value("url:x", "abcd1234").unwrap().as_str(),
            "abcd1234"
        );
        assert_eq!(
            decode_reverse_value("url:x", "\"abcd1234\"").unwrap().as_str(),
            "abcd1234"
        );
        assert!(decode_reverse_value("url:x", "{}").is_err());
    }

    #[test]
    fn url_validation() {
        assert!(validate_url("https://example.com/a").is_ok());
        assert!(validate_url("http://localhost:8080/path?q=1").is_ok());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("/relative/path").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn reverse_namespace_detection() {
        assert!(is_reverse_key("url:abc"));
        assert!(!is_reverse_key("deadbeef"));
        assert!(!is_reverse_key("xurl:abc"));
    }
}
