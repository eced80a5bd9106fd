//! Content-derived identifiers.
//!
//! Every identifier in the core (schema ids, entity ids, record ids) is a
//! digest over a *canonical* rendering of the fields it depends on:
//!
//! - algorithm: **SHA-256**
//! - input: canonical JSON (object keys sorted, no whitespace) optionally
//!   prefixed by other identifiers
//! - output: 64 lowercase hex digits
//!
//! Notes:
//! - Canonical JSON is written here rather than delegated to `serde_json`'s
//!   map ordering, so the bytes never depend on crate features.
//! - Identifiers are pure functions of their inputs; nothing runtime-only
//!   (addresses, insertion order of hash maps) may leak in.

use sha2::{Digest, Sha256};

use crate::value::Value;

/// Length of every identifier produced by this module.
pub const ID_HEX_LEN: usize = 64;

pub fn sha256_hex(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Serialize a JSON value with sorted object keys and no insignificant whitespace.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Null => out.push_str("null"),
        serde_json::Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        serde_json::Value::Number(n) => out.push_str(&n.to_string()),
        serde_json::Value::String(s) => write_string(s, out),
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // serde_json's string escaping is stable and does not depend on features.
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}

pub fn digest_json(value: &serde_json::Value) -> String {
    sha256_hex(&canonical_json(value))
}

/// Entity identity: schema id followed by the ordered `(key field, value)` pairs.
///
/// Only key fields participate, so non-key properties never move the id.
pub fn entity_id(schema_id: &str, key_pairs: &[(&str, &Value)]) -> String {
    let pairs: Vec<serde_json::Value> = key_pairs
        .iter()
        .map(|(name, value)| serde_json::json!([name, value.to_json()]))
        .collect();
    let mut text = String::from(schema_id);
    text.push_str(&canonical_json(&serde_json::Value::Array(pairs)));
    sha256_hex(&text)
}

/// Record identity for `keep_all` schemas: schema id, primary entity ids and an
/// evidence discriminator, concatenated in that order.
pub fn record_id(schema_id: &str, primary_ids: &[&str], evidence: &str) -> String {
    let mut text = String::from(schema_id);
    for id in primary_ids {
        text.push_str(id);
    }
    text.push_str(evidence);
    sha256_hex(&text)
}
