use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Error, Result};

// =============================================================================
// Fingerprint
// =============================================================================

/// Length of a fingerprint in hex digits.
pub const FINGERPRINT_LEN: usize = 64;

/// Stable content address of an HTTP request: SHA-256 over the sorted JSON
/// fields plus the route that served it.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a JSON request body as received on `route`.
    ///
    /// Keys are visited in sorted order and each key/value pair is framed by
    /// NUL bytes, so reordering fields never changes the result while moving
    /// text between fields always does.
    pub fn of_fields(fields: &serde_json::Map<String, serde_json::Value>, route: &str) -> Self {
        let mut keys: Vec<&String> = fields.keys().collect();
        keys.sort();

        let mut hasher = Sha256::new();
        for key in keys {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            match &fields[key] {
                serde_json::Value::String(s) => hasher.update(s.as_bytes()),
                other => hasher.update(other.to_string().as_bytes()),
            }
            hasher.update([0u8]);
        }
        hasher.update(route.as_bytes());

        Self(hex::encode(hasher.finalize()))
    }

    /// Parse an identifier supplied by a client.
    ///
    /// Only lowercase hex of the exact length is accepted, which also keeps
    /// the identifier safe to use as a path component.
    pub fn parse(id: &str) -> Result<Self> {
        let valid = id.len() == FINGERPRINT_LEN
            && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(id.to_string()))
        } else {
            Err(Error::invalid_request(format!("malformed identifier {:?}", id)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the hex digits into `width`-sized chunks. A trailing partial
    /// chunk is dropped.
    pub fn segments(&self, width: usize) -> Vec<&str> {
        let width = width.max(1);
        (0..self.0.len() / width)
            .map(|i| &self.0[i * width..(i + 1) * width])
            .collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A completed request as kept by the persistent result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Source exactly as submitted.
    pub source: String,
    /// Response body produced for it.
    pub output: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(source: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            source: source.into(),
            output,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fingerprint_ignores_field_order() {
        let a = fields(json!({"code": "fn main() {}", "optimize": "2", "version": "stable"}));
        let b = fields(json!({"version": "stable", "code": "fn main() {}", "optimize": "2"}));
        assert_eq!(
            Fingerprint::of_fields(&a, "/evaluate.json"),
            Fingerprint::of_fields(&b, "/evaluate.json")
        );
    }

    #[test]
    fn test_fingerprint_depends_on_route() {
        let a = fields(json!({"code": "fn main() {}"}));
        assert_ne!(
            Fingerprint::of_fields(&a, "/evaluate.json"),
            Fingerprint::of_fields(&a, "/compile.json")
        );
    }

    #[test]
    fn test_fingerprint_frames_fields() {
        let a = fields(json!({"a": "xy", "b": "z"}));
        let b = fields(json!({"a": "x", "b": "yz"}));
        assert_ne!(Fingerprint::of_fields(&a, "/r"), Fingerprint::of_fields(&b, "/r"));
    }

    #[test]
    fn test_parse_and_segments() {
        let fp = Fingerprint::of_fields(&fields(json!({"code": "1"})), "/evaluate.json");
        assert_eq!(Fingerprint::parse(fp.as_str()).unwrap(), fp);
        assert!(Fingerprint::parse("../../etc/passwd").is_err());
        assert!(Fingerprint::parse(&fp.as_str().to_uppercase()).is_err());

        let segments = fp.segments(4);
        assert_eq!(segments.len(), FINGERPRINT_LEN / 4);
        assert_eq!(segments.concat(), fp.as_str());
    }
}
