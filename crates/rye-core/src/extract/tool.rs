//! Tool declarations from source files and structured manifests.

use serde_json::{Map, Value};

use super::source::{parse_module, SourceLanguage};
use crate::errors::{RyeError, RyeResult};

/// Source-level names and the normalized field each one feeds.
const DECLARED_FIELDS: &[(&str, &str)] = &[
    ("__version__", "version"),
    ("__tool_type__", "tool_type"),
    ("__executor_id__", "executor_id"),
    ("__category__", "category"),
    ("__description__", "description"),
    ("__tool_description__", "description"),
    ("__inputs__", "inputs"),
    ("__outputs__", "outputs"),
    ("ENV_CONFIG", "env_config"),
    ("CONFIG", "config"),
    ("CONFIG_SCHEMA", "config_schema"),
    ("CHILD_CONSTRAINTS", "child_constraints"),
];

pub(crate) fn extract_source(
    content: &str,
    language: SourceLanguage,
) -> RyeResult<Map<String, Value>> {
    let module = parse_module(content, language)?;
    let assignments = module.values();
    let mut fields = Map::new();
    for (declared, field) in DECLARED_FIELDS {
        if let Some(value) = assignments.get(*declared) {
            fields.insert((*field).to_string(), value.clone());
        }
    }
    if !fields.contains_key("description") {
        let summary = module.docstring.as_deref().and_then(|doc| {
            doc.lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        });
        if let Some(summary) = summary {
            fields.insert("description".to_string(), Value::String(summary));
        }
    }
    Ok(fields)
}

pub(crate) fn extract_yaml(content: &str) -> RyeResult<Map<String, Value>> {
    into_object(serde_yaml::from_str(content)?)
}

pub(crate) fn extract_json(content: &str) -> RyeResult<Map<String, Value>> {
    into_object(serde_json::from_str(content)?)
}

fn into_object(value: Value) -> RyeResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(RyeError::Parse("tool manifest must be a mapping".to_string())),
    }
}
