//! Canonicalizes a transport's parameter map into a stable pool cache key
//! (`spec.md` §4.D.3): sort keys, stringify values, hash, keep the first 64
//! bits.

use opal_decode::ArgValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Render `value` into the flat string form used for canonicalization.
fn stringify(value: &ArgValue) -> String {
    match value {
        ArgValue::String(s) => s.clone(),
        ArgValue::Integer(i) => i.to_string(),
        ArgValue::Float(f) => f.to_string(),
        ArgValue::Boolean(b) => b.to_string(),
        ArgValue::Duration(d) => format!("{}ms", d.as_millis()),
        ArgValue::Handle(h) => h.clone(),
        ArgValue::Object(fields) => {
            let mut parts: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={}", stringify(v))).collect();
            parts.sort();
            format!("{{{}}}", parts.join(","))
        }
        ArgValue::Array(items) => {
            let parts: Vec<String> = items.iter().map(stringify).collect();
            format!("[{}]", parts.join(","))
        }
    }
}

/// Canonicalize `params` (sorted keys, stringified values) into the exact
/// form that is hashed for pool cache keys.
#[must_use]
pub fn canonicalize(params: &BTreeMap<String, ArgValue>) -> String {
    // `BTreeMap` iteration is already key-sorted.
    let parts: Vec<String> = params.iter().map(|(k, v)| format!("{k}={}", stringify(v))).collect();
    parts.join("&")
}

/// Digest `transport_path` and `params` into a 64-bit pool cache key,
/// stable across key insertion order.
#[must_use]
pub fn pool_key(transport_path: &str, params: &BTreeMap<String, ArgValue>) -> String {
    let canonical = format!("{transport_path}?{}", canonicalize(params));
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for byte in &digest[..8] {
        write!(out, "{byte:02x}").expect("writing to a String cannot fail");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, ArgValue)]) -> BTreeMap<String, ArgValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn key_order_does_not_affect_the_digest() {
        let a = params(&[("host", ArgValue::String("h".to_string())), ("port", ArgValue::Integer(22))]);
        let b = params(&[("port", ArgValue::Integer(22)), ("host", ArgValue::String("h".to_string()))]);
        assert_eq!(pool_key("ssh", &a), pool_key("ssh", &b));
    }

    #[test]
    fn different_transport_paths_produce_different_keys() {
        let p = params(&[("host", ArgValue::String("h".to_string()))]);
        assert_ne!(pool_key("ssh", &p), pool_key("docker", &p));
    }

    #[test]
    fn different_values_produce_different_keys() {
        let a = params(&[("host", ArgValue::String("a".to_string()))]);
        let b = params(&[("host", ArgValue::String("b".to_string()))]);
        assert_ne!(pool_key("ssh", &a), pool_key("ssh", &b));
    }
}
