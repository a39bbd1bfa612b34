//! Shared typed models used across resolution, validation, and search.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::RyeError;

// ---------------------------------------------------------------------------
// Spaces and item kinds
// ---------------------------------------------------------------------------

/// One of the three storage tiers, highest precedence first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    #[default]
    Project,
    User,
    System,
}

impl Space {
    pub const ALL: [Space; 3] = [Space::Project, Space::User, Space::System];

    /// Lattice rank: a space may only depend on spaces of equal or lower rank.
    pub fn rank(self) -> u8 {
        match self {
            Space::Project => 2,
            Space::User => 1,
            Space::System => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Space::Project => "project",
            Space::User => "user",
            Space::System => "system",
        }
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, Space::System)
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Space {
    type Err = RyeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "project" => Ok(Space::Project),
            "user" => Ok(Space::User),
            "system" => Ok(Space::System),
            other => Err(RyeError::InvalidInput(format!("unknown space: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Primitive,
    Runtime,
    Tool,
}

impl ToolType {
    /// Map a declared tool type onto the chain role it plays.  Language tags
    /// such as `python` or `bash` are ordinary tools.
    pub fn from_declared(declared: Option<&str>, has_executor: bool) -> Self {
        match declared.map(|d| d.trim().to_lowercase()).as_deref() {
            Some("primitive") => ToolType::Primitive,
            Some("runtime") => ToolType::Runtime,
            Some(_) => ToolType::Tool,
            None if has_executor => ToolType::Tool,
            None => ToolType::Primitive,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolType::Primitive => "primitive",
            ToolType::Runtime => "runtime",
            ToolType::Tool => "tool",
        }
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Directive,
    Tool,
    Knowledge,
}

impl ItemType {
    pub fn type_dir(self) -> &'static str {
        match self {
            ItemType::Directive => "directives",
            ItemType::Tool => "tools",
            ItemType::Knowledge => "knowledge",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Directive => "directive",
            ItemType::Tool => "tool",
            ItemType::Knowledge => "knowledge",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = RyeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "directive" | "directives" => Ok(ItemType::Directive),
            "tool" | "tools" => Ok(ItemType::Tool),
            "knowledge" => Ok(ItemType::Knowledge),
            other => Err(RyeError::InvalidInput(format!("unknown item type: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Chain elements
// ---------------------------------------------------------------------------

/// One resolved link of an execution chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainElement {
    pub item_id: String,
    pub space: Space,
    pub tool_type: ToolType,
    pub executor_id: Option<String>,
    pub version: Option<String>,
    pub path: PathBuf,
    pub config: Map<String, Value>,
    pub env_config: Option<Map<String, Value>>,
    pub config_schema: Option<Value>,
    pub inputs: Option<Vec<String>>,
    pub outputs: Option<Vec<String>>,
    pub child_constraints: Option<Map<String, Value>>,
}

impl ChainElement {
    pub fn is_terminal(&self) -> bool {
        self.executor_id.is_none()
    }
}

pub(crate) fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        Value::String(s) => Some(vec![s.clone()]),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Execution results
// ---------------------------------------------------------------------------

/// Outcome of running a primitive (or of failing to reach one).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
    pub duration_ms: f64,
    pub chain: Vec<String>,
}

impl ExecutionResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            duration_ms: 0.0,
            chain: Vec::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
            duration_ms: 0.0,
            chain: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_rank_order() {
        assert!(Space::Project.rank() > Space::User.rank());
        assert!(Space::User.rank() > Space::System.rank());
        assert_eq!("User".parse::<Space>().unwrap(), Space::User);
        assert!("global".parse::<Space>().is_err());
    }

    #[test]
    fn test_tool_type_from_declared() {
        assert_eq!(ToolType::from_declared(Some("primitive"), false), ToolType::Primitive);
        assert_eq!(ToolType::from_declared(Some("Runtime"), true), ToolType::Runtime);
        assert_eq!(ToolType::from_declared(Some("python"), true), ToolType::Tool);
        assert_eq!(ToolType::from_declared(None, false), ToolType::Primitive);
        assert_eq!(ToolType::from_declared(None, true), ToolType::Tool);
    }

    #[test]
    fn test_space_serde_lowercase() {
        let json = serde_json::to_string(&Space::System).unwrap();
        assert_eq!(json, "\"system\"");
        let parsed: Space = serde_json::from_str("\"project\"").unwrap();
        assert_eq!(parsed, Space::Project);
    }

    #[test]
    fn test_item_type_dirs() {
        assert_eq!(ItemType::Directive.type_dir(), "directives");
        assert_eq!("tools".parse::<ItemType>().unwrap(), ItemType::Tool);
        assert_eq!(ItemType::Knowledge.type_dir(), "knowledge");
    }
}
