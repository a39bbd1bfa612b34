//! Shell-safe config templating.
//!
//! Strings anywhere in a config tree (mapping values, sequence elements)
//! get two kinds of placeholder substituted in a single pass:
//!
//! - `${VAR}` / `${VAR:-default}`: value from the env, else the default,
//!   else the empty string
//! - `{name}`: value from the env, else from the config's own top-level
//!   scalars (after their `${VAR}` substitution); unknown names stay verbatim
//!
//! Each substituted value that contains a shell metacharacter is
//! single-quoted before it is spliced in, so the resulting string can be
//! handed to a shell without the value being interpreted.  Benign values
//! are spliced unchanged.

use std::borrow::Cow;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::env::{expand_value, Env};
use crate::extract::scalar_string;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap()
});

/// Characters that make a substituted value unsafe to splice into a shell
/// command unquoted.
const SHELL_METACHARACTERS: &[char] = &[
    '$', '`', ';', '|', '&', '<', '>', '(', ')', '{', '}', '[', ']', '\'', '"', '\\', '*', '?',
    '!', '#', '~',
];

pub fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || SHELL_METACHARACTERS.contains(&c))
}

/// POSIX single-quote `value` when it contains shell metacharacters.
pub fn quote_if_unsafe(value: &str) -> Cow<'_, str> {
    if needs_quoting(value) {
        shell_escape::unix::escape(Cow::Borrowed(value))
    } else {
        Cow::Borrowed(value)
    }
}

/// Template every string in `config` against `env`.
pub fn template_config(config: &Value, env: &Env) -> Value {
    let params = parameter_scope(config, env);
    template_value(config, env, Some(&params))
}

/// Substitute placeholders in one string.  Without `params`, `{name}`
/// placeholders are left as they are.
pub fn template_string(text: &str, env: &Env, params: Option<&Env>) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures<'_>| {
            if let Some(var) = caps.get(1) {
                let value = match env.get(var.as_str()) {
                    Some(v) => v.as_str(),
                    None => caps.get(2).map_or("", |d| d.as_str()),
                };
                return quote_if_unsafe(value).into_owned();
            }
            let name = caps.get(3).map_or("", |m| m.as_str());
            match env.get(name).or_else(|| params.and_then(|p| p.get(name))) {
                Some(value) => quote_if_unsafe(value).into_owned(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn template_value(value: &Value, env: &Env, params: Option<&Env>) -> Value {
    match value {
        Value::String(s) => Value::String(template_string(s, env, params)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| template_value(item, env, params))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), template_value(v, env, params)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// `{name}` lookups: top-level scalars of the config, with their `${VAR}`
/// references already resolved but not shell-quoted.
fn parameter_scope(config: &Value, env: &Env) -> Env {
    let mut params = IndexMap::new();
    if let Value::Object(map) = config {
        for (key, value) in map {
            if let Some(raw) = scalar_string(value) {
                params.insert(key.clone(), expand_value(&raw, env));
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> Env {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_basic_substitution_recurses() {
        let config = json!({
            "command": "${PYTHON}",
            "args": ["${SCRIPT}", "--verbose"],
            "nested": {"path": "${HOME}/app"},
            "timeout": 30,
        });
        let e = env(&[("PYTHON", "/usr/bin/python3"), ("SCRIPT", "main.py"), ("HOME", "/home/user")]);
        let out = template_config(&config, &e);
        assert_eq!(out["command"], json!("/usr/bin/python3"));
        assert_eq!(out["args"], json!(["main.py", "--verbose"]));
        assert_eq!(out["nested"]["path"], json!("/home/user/app"));
        assert_eq!(out["timeout"], json!(30));
    }

    #[test]
    fn test_defaults() {
        let out = template_config(&json!({"command": "${MISSING:-fallback}"}), &Env::new());
        assert_eq!(out["command"], json!("fallback"));
        let out = template_config(&json!({"path": "${PATH:-/usr/bin}"}), &Env::new());
        assert_eq!(out["path"], json!("/usr/bin"));
        let out = template_config(&json!({"x": "a${MISSING}b"}), &Env::new());
        assert_eq!(out["x"], json!("ab"));
    }

    #[test]
    fn test_injection_values_are_quoted() {
        let cases = [
            ("$(rm -rf /)", "'$(rm -rf /)'"),
            ("`whoami`", "'`whoami`'"),
            ("safe_value | malicious_command", "'safe_value | malicious_command'"),
            ("first_command; rm -rf /", "'first_command; rm -rf /'"),
            ("safe & malicious", "'safe & malicious'"),
            ("a > /etc/passwd", "'a > /etc/passwd'"),
        ];
        for (value, quoted) in cases {
            let out = template_config(&json!({"script": "${VAR}"}), &env(&[("VAR", value)]));
            assert_eq!(out["script"], json!(quoted), "value {value:?}");
        }
    }

    #[test]
    fn test_quoting_applies_to_substitution_only() {
        let out = template_config(&json!({"cmd": "echo ${X}"}), &env(&[("X", "$(rm -rf /)")]));
        assert_eq!(out["cmd"], json!("echo '$(rm -rf /)'"));

        let out = template_config(
            &json!({"cmd": "run ${A} ${B}"}),
            &env(&[("A", "x; y"), ("B", "`id`")]),
        );
        assert_eq!(out["cmd"], json!("run 'x; y' '`id`'"));
    }

    #[test]
    fn test_embedded_single_quote_is_escaped() {
        let out = template_config(&json!({"cmd": "${X}"}), &env(&[("X", "it's; bad")]));
        assert_eq!(out["cmd"], json!("'it'\\''s; bad'"));
    }

    #[test]
    fn test_benign_values_untouched() {
        let out = template_config(
            &json!({"cmd": "echo ${USER}", "path": "${HOME}"}),
            &env(&[("USER", "alice"), ("HOME", "/home/user")]),
        );
        assert_eq!(out, json!({"cmd": "echo alice", "path": "/home/user"}));
    }

    #[test]
    fn test_default_with_injection_is_quoted() {
        let out = template_config(&json!({"script": "${VAR:-$(rm -rf /)}"}), &Env::new());
        assert_eq!(out["script"], json!("'$(rm -rf /)'"));
    }

    #[test]
    fn test_nested_and_list_escaping() {
        let config = json!({
            "commands": {"script": "${SCRIPT}", "output": "${OUTPUT}"},
            "args": ["${VAR1}", "${VAR2}", "static"],
        });
        let e = env(&[
            ("SCRIPT", "echo hello; malicious"),
            ("OUTPUT", "/tmp/file"),
            ("VAR1", "$(malicious)"),
            ("VAR2", "safe_value"),
        ]);
        let out = template_config(&config, &e);
        assert_eq!(out["commands"]["script"], json!("'echo hello; malicious'"));
        assert_eq!(out["commands"]["output"], json!("/tmp/file"));
        assert_eq!(out["args"], json!(["'$(malicious)'", "safe_value", "static"]));
    }

    #[test]
    fn test_param_placeholders() {
        let config = json!({"user": "${USER}", "greeting": "Hello {user}", "other": "{missing_param}"});
        let out = template_config(&config, &env(&[("USER", "alice")]));
        assert_eq!(out["greeting"], json!("Hello alice"));
        assert_eq!(out["other"], json!("{missing_param}"));

        let out = template_config(&json!({"msg": "hi {name}"}), &env(&[("name", "a b")]));
        assert_eq!(out["msg"], json!("hi 'a b'"));
    }

    #[test]
    fn test_json_like_braces_untouched() {
        let out = template_config(&json!({"body": "{\"a\": 1}"}), &Env::new());
        assert_eq!(out["body"], json!("{\"a\": 1}"));
    }
}
