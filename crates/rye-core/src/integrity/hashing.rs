//! Canonical content hashing for tools, directives and knowledge entries.
//!
//! Every hash is the SHA-256 of a compact JSON payload whose object keys are
//! sorted at every depth, so reordering a manifest never changes its hash.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

/// Compact JSON with object keys sorted recursively.
///
/// Characters from U+007F up are written as `\uXXXX` escapes (UTF-16 code
/// units), so the output is pure ASCII.
pub fn canonical_json(value: &Value) -> String {
    let compact = sorted(value).to_string();
    let mut out = String::with_capacity(compact.len());
    let mut units = [0u16; 2];
    for c in compact.chars() {
        if c < '\u{7f}' {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{unit:04x}"));
        }
    }
    out
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn hash_payload(payload: &Value) -> String {
    sha256_hex(canonical_json(payload).as_bytes())
}

pub fn compute_tool_integrity(
    tool_id: &str,
    version: &str,
    manifest: &Value,
    files: Option<&[Value]>,
) -> String {
    hash_payload(&json!({
        "tool_id": tool_id,
        "version": version,
        "manifest": manifest,
        "files": files.unwrap_or_default(),
    }))
}

pub fn compute_directive_integrity(
    name: &str,
    version: &str,
    xml_content: &str,
    metadata: Option<&Value>,
) -> String {
    hash_payload(&json!({
        "name": name,
        "version": version,
        "xml_content": xml_content,
        "metadata": metadata.cloned().unwrap_or_else(|| json!({})),
    }))
}

pub fn compute_knowledge_integrity(
    id: &str,
    version: &str,
    content: &str,
    metadata: Option<&Value>,
) -> String {
    hash_payload(&json!({
        "id": id,
        "version": version,
        "content": content,
        "metadata": metadata.cloned().unwrap_or_else(|| json!({})),
    }))
}

/// Compare an expected hash against the computed one.
///
/// A `sha256:` prefix is ignored, comparison is case-insensitive, and an
/// expectation shorter than a full digest is treated as a prefix.
pub fn hash_matches(expected: &str, actual: &str) -> bool {
    let expected = expected.trim();
    let expected = expected.strip_prefix("sha256:").unwrap_or(expected).to_lowercase();
    let actual = actual.to_lowercase();
    if expected.len() < 64 {
        actual.starts_with(&expected)
    } else {
        actual == expected
    }
}
