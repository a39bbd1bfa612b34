//! Knowledge metadata: the YAML frontmatter block at the top of an entry.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::{RyeError, RyeResult};

static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)").unwrap()
});

/// Split an entry into its raw frontmatter (if any) and its body.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    match FRONTMATTER_RE.captures(content) {
        Some(caps) => {
            let (Some(whole), Some(yaml)) = (caps.get(0), caps.get(1)) else {
                return (None, content);
            };
            (Some(yaml.as_str()), &content[whole.end()..])
        }
        None => (None, content),
    }
}

/// Parse the frontmatter into a map; entries without one yield an empty map.
pub fn extract(content: &str) -> RyeResult<Map<String, Value>> {
    let (Some(raw), _) = split_frontmatter(content) else {
        return Ok(Map::new());
    };
    match serde_yaml::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(RyeError::Parse(format!(
            "frontmatter must be a mapping, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frontmatter_fields() {
        let doc = "---\nid: caching-notes\ntitle: Caching Notes\nversion: 1.0.0\ntags: [cache, perf]\n---\n# Body\ntext\n";
        let fields = extract(doc).unwrap();
        assert_eq!(fields["id"], json!("caching-notes"));
        assert_eq!(fields["title"], json!("Caching Notes"));
        assert_eq!(fields["tags"], json!(["cache", "perf"]));

        let (_, body) = split_frontmatter(doc);
        assert_eq!(body, "# Body\ntext\n");
    }

    #[test]
    fn test_no_frontmatter() {
        assert!(extract("# Just a heading\n").unwrap().is_empty());
        assert_eq!(split_frontmatter("plain").1, "plain");
    }

    #[test]
    fn test_scalar_frontmatter_is_error() {
        assert!(extract("---\njust a string\n---\n").is_err());
    }
}
