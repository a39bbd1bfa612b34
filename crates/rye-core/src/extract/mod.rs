//! Static metadata extraction for items on disk.
//!
//! Each file format has its own extractor and none of them executes the
//! file.  Extractors return a flat map of normalized field names
//! (`version`, `tool_type`, `executor_id`, `name`, `description`, ...).

pub mod directive;
pub mod knowledge;
pub mod source;
mod tool;

use std::path::Path;

use serde_json::{Map, Value};

use crate::errors::{RyeError, RyeResult};
use crate::models::{string_list, ItemType};
pub use source::SourceLanguage;

/// Recognised tool file extensions, in resolution preference order.
pub const TOOL_EXTENSIONS: &[&str] = &["py", "yaml", "yml", "json", "js", "sh"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Module-level `NAME = <literal>` assignments (`.py`, `.js`, `.sh`).
    Source(SourceLanguage),
    Yaml,
    Json,
    /// Root-element attributes of the `<directive>` block.
    DirectiveXml,
    /// YAML frontmatter of a knowledge entry.
    Frontmatter,
}

impl Extractor {
    pub fn for_tool(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "py" | "js" | "sh" => SourceLanguage::for_path(path).map(Extractor::Source),
            "yaml" | "yml" => Some(Extractor::Yaml),
            "json" => Some(Extractor::Json),
            _ => None,
        }
    }

    pub fn for_item(item_type: ItemType, path: &Path) -> Option<Self> {
        match item_type {
            ItemType::Tool => Self::for_tool(path),
            ItemType::Directive => Some(Extractor::DirectiveXml),
            ItemType::Knowledge => Some(Extractor::Frontmatter),
        }
    }

    pub fn extract(self, content: &str) -> RyeResult<Map<String, Value>> {
        match self {
            Extractor::Source(language) => tool::extract_source(content, language),
            Extractor::Yaml => tool::extract_yaml(content),
            Extractor::Json => tool::extract_json(content),
            Extractor::DirectiveXml => Ok(directive::extract(content)),
            Extractor::Frontmatter => knowledge::extract(content),
        }
    }
}

/// Render a scalar field as a string (`1.0` stays `1.0`); `null` and
/// containers yield `None`.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Typed view over the fields declared by a tool file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolManifest {
    pub version: Option<String>,
    pub tool_type: Option<String>,
    pub executor_id: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub config: Map<String, Value>,
    pub env_config: Option<Map<String, Value>>,
    pub config_schema: Option<Value>,
    pub inputs: Option<Vec<String>>,
    pub outputs: Option<Vec<String>>,
    pub child_constraints: Option<Map<String, Value>>,
    pub fields: Map<String, Value>,
}

impl ToolManifest {
    pub fn load(path: &Path) -> RyeResult<Self> {
        let extractor = Extractor::for_tool(path).ok_or_else(|| {
            RyeError::InvalidInput(format!("unsupported tool file: {}", path.display()))
        })?;
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_fields(extractor.extract(&content)?))
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let text = |key: &str| fields.get(key).and_then(scalar_string);
        let config = match fields.get("config") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        // Contract fields may sit at the top level or inside `config`.
        let contract = |key: &str| fields.get(key).or_else(|| config.get(key));
        let object = |value: Option<&Value>| match value {
            Some(Value::Object(map)) => Some(map.clone()),
            _ => None,
        };

        Self {
            version: text("version"),
            tool_type: text("tool_type"),
            executor_id: text("executor_id").filter(|id| !id.trim().is_empty()),
            category: text("category"),
            description: text("description"),
            env_config: object(fields.get("env_config")),
            config_schema: fields.get("config_schema").filter(|v| !v.is_null()).cloned(),
            inputs: contract("inputs").and_then(string_list),
            outputs: contract("outputs").and_then(string_list),
            child_constraints: object(contract("child_constraints")),
            config,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_extractor_dispatch() {
        assert_eq!(
            Extractor::for_tool(Path::new("a/b.py")),
            Some(Extractor::Source(SourceLanguage::Python))
        );
        assert_eq!(Extractor::for_tool(Path::new("b.yml")), Some(Extractor::Yaml));
        assert_eq!(Extractor::for_tool(Path::new("b.txt")), None);
        assert_eq!(
            Extractor::for_item(ItemType::Knowledge, Path::new("k.md")),
            Some(Extractor::Frontmatter)
        );
    }

    #[test]
    fn test_manifest_from_fields() {
        let fields = json!({
            "version": 1.5,
            "tool_type": "runtime",
            "executor_id": "rye/core/primitives/subprocess",
            "env_config": {"interpreter": {"type": "venv_python"}},
            "config": {"command": "python", "outputs": ["json"]},
            "inputs": ["text"],
        });
        let manifest = ToolManifest::from_fields(fields.as_object().unwrap().clone());
        assert_eq!(manifest.version.as_deref(), Some("1.5"));
        assert_eq!(manifest.executor_id.as_deref(), Some("rye/core/primitives/subprocess"));
        assert!(manifest.env_config.is_some());
        assert_eq!(manifest.inputs, Some(vec!["text".to_string()]));
        assert_eq!(manifest.outputs, Some(vec!["json".to_string()]));
        assert_eq!(manifest.config["command"], json!("python"));
    }

    #[test]
    fn test_manifest_load_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path: PathBuf = tmp.path().join("subprocess.py");
        std::fs::write(
            &path,
            "__version__ = '1.0.0'\n__tool_type__ = 'primitive'\n__executor_id__ = None\n",
        )
        .unwrap();
        let manifest = ToolManifest::load(&path).unwrap();
        assert_eq!(manifest.tool_type.as_deref(), Some("primitive"));
        assert_eq!(manifest.executor_id, None);

        assert!(ToolManifest::load(&tmp.path().join("missing.py")).is_err());
        assert!(ToolManifest::load(&tmp.path().join("notes.txt")).is_err());
    }
}
