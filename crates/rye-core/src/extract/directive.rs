//! Directive metadata: attributes and child elements of the `<directive>` block.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static DIRECTIVE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<directive\b([^>]*)>").unwrap());

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<description>\s*(.*?)\s*</description>").unwrap());

static CATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<category>\s*(.*?)\s*</category>").unwrap());

/// Root-element attributes plus `description` and `category`.
pub fn extract(content: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(attrs) = DIRECTIVE_OPEN_RE.captures(content).and_then(|c| c.get(1)) {
        for caps in ATTR_RE.captures_iter(attrs.as_str()) {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            fields.insert(caps[1].to_string(), Value::String(value.to_string()));
        }
    }
    for (key, re) in [("description", &DESCRIPTION_RE), ("category", &CATEGORY_RE)] {
        if let Some(m) = re.captures(content).and_then(|c| c.get(1)) {
            fields.insert(key.to_string(), Value::String(m.as_str().to_string()));
        }
    }
    fields
}
