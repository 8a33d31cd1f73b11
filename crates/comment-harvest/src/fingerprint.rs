//! Content fingerprints over canonicalized JSON.
//!
//! Canonical form: object keys sorted lexicographically at every depth, no
//! insignificant whitespace, strings emitted as UTF-8 (non-ASCII is not
//! escaped). The fingerprint is the hex SHA-256 of that text, so two
//! payloads that differ only in key order hash identically.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::ContentFingerprint;

/// Compute the fingerprint of a payload.
pub fn fingerprint(payload: &Value) -> ContentFingerprint {
    let canonical = canonical_json(payload);
    let digest = Sha256::digest(canonical.as_bytes());
    ContentFingerprint::from_hex(hex::encode(digest))
}

/// Render a value in canonical form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Null, booleans and numbers have a single serde_json rendering.
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    // serde_json escapes only what JSON requires and leaves non-ASCII as is.
    out.push_str(&Value::String(s.to_string()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_is_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":[1,2],"x":null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":null,"y":[1,2]},"b":1}"#).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_array_order_matters() {
        assert_ne!(fingerprint(&json!([1, 2])), fingerprint(&json!([2, 1])));
    }

    #[test]
    fn test_canonical_form() {
        let v = json!({"z": "é", "a": [true, null, 1.5]});
        assert_eq!(canonical_json(&v), r#"{"a":[true,null,1.5],"z":"é"}"#);
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint(&json!({}));
        assert_eq!(fp.as_str().len(), 64);
        // sha256("{}")
        assert_eq!(
            fp.as_str(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert_eq!(fp.short().len(), 12);
    }
}
