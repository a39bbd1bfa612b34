//! Pairwise legality checks over a resolved execution chain.
//!
//! Each adjacent pair `(child, parent)` is checked for:
//! - space precedence: a child may only depend on a space of equal or
//!   lower rank (project > user > system)
//! - I/O contracts: every declared parent input must be among the
//!   child's declared outputs
//! - version constraints the parent places on the child
//!
//! Every violation is collected; validation never stops at the first one.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::extract::scalar_string;
use crate::models::{ChainElement, Space, ToolType};
use crate::version::version_satisfies;

/// The fields of a chain element that validation looks at.
///
/// Deserialization accepts chain dicts as hosts write them: `tool_type` may
/// be a language tag such as `python` (an ordinary tool) and `version` may
/// be a number.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChainLink {
    pub item_id: String,
    pub space: Space,
    #[serde(deserialize_with = "declared_tool_type")]
    pub tool_type: Option<ToolType>,
    pub executor_id: Option<String>,
    #[serde(deserialize_with = "scalar_version")]
    pub version: Option<String>,
    pub inputs: Option<Vec<String>>,
    pub outputs: Option<Vec<String>>,
    pub child_constraints: Option<Map<String, Value>>,
}

impl From<&ChainElement> for ChainLink {
    fn from(element: &ChainElement) -> Self {
        Self {
            item_id: element.item_id.clone(),
            space: element.space,
            tool_type: Some(element.tool_type),
            executor_id: element.executor_id.clone(),
            version: element.version.clone(),
            inputs: element.inputs.clone(),
            outputs: element.outputs.clone(),
            child_constraints: element.child_constraints.clone(),
        }
    }
}

fn declared_tool_type<'de, D>(deserializer: D) -> Result<Option<ToolType>, D::Error>
where
    D: Deserializer<'de>,
{
    let declared = Option::<Value>::deserialize(deserializer)?;
    Ok(declared
        .as_ref()
        .and_then(scalar_string)
        .map(|t| ToolType::from_declared(Some(&t), false)))
}

fn scalar_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let version = Option::<Value>::deserialize(deserializer)?;
    Ok(version.as_ref().and_then(scalar_string))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<String>,
    pub validated_pairs: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChainValidator;

impl ChainValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_elements(&self, chain: &[ChainElement]) -> ValidationResult {
        let links: Vec<ChainLink> = chain.iter().map(ChainLink::from).collect();
        self.validate_chain(&links)
    }

    pub fn validate_chain(&self, chain: &[ChainLink]) -> ValidationResult {
        let mut issues = Vec::new();
        let mut validated_pairs = 0;

        for pair in chain.windows(2) {
            let (child, parent) = (&pair[0], &pair[1]);
            check_space(child, parent, &mut issues);
            check_io(child, parent, &mut issues);
            check_version(child, parent, &mut issues);
            validated_pairs += 1;
        }

        if chain.len() > 1 {
            if let Some(terminal) = chain.last() {
                check_terminal(terminal, &mut issues);
            }
        }

        if !issues.is_empty() {
            debug!(
                root = chain.first().map_or("", |l| l.item_id.as_str()),
                issues = issues.len(),
                "chain validation failed"
            );
        }

        ValidationResult {
            valid: issues.is_empty(),
            issues,
            validated_pairs,
        }
    }
}

fn check_space(child: &ChainLink, parent: &ChainLink, issues: &mut Vec<String>) {
    if parent.space.rank() > child.space.rank() {
        issues.push(format!(
            "{} (space={}) cannot depend on {} (space={})",
            child.item_id, child.space, parent.item_id, parent.space
        ));
    }
}

fn check_io(child: &ChainLink, parent: &ChainLink, issues: &mut Vec<String>) {
    let (Some(required), Some(provided)) = (&parent.inputs, &child.outputs) else {
        return;
    };
    for kind in required.iter().filter(|k| !provided.contains(k)) {
        issues.push(format!(
            "I/O mismatch: {} requires input '{}' which {} does not output",
            parent.item_id, kind, child.item_id
        ));
    }
}

fn check_version(child: &ChainLink, parent: &ChainLink, issues: &mut Vec<String>) {
    let Some(version) = child.version.as_deref() else {
        return;
    };
    let Some(Value::Object(constraint)) = parent
        .child_constraints
        .as_ref()
        .and_then(|c| c.get(&child.item_id))
    else {
        return;
    };

    let bounds = [("min_version", ">="), ("max_version", "<=")];
    for (key, op) in bounds {
        let Some(bound) = constraint.get(key).and_then(scalar_string) else {
            continue;
        };
        if !version_satisfies(version, op, &bound) {
            issues.push(format!(
                "Version constraint failed: {} version {} does not satisfy {} {} required by {}",
                child.item_id, version, key, bound, parent.item_id
            ));
        }
    }
}

fn check_terminal(terminal: &ChainLink, issues: &mut Vec<String>) {
    if let Some(executor) = &terminal.executor_id {
        issues.push(format!(
            "{} declares executor {} but ends the chain",
            terminal.item_id, executor
        ));
    } else if terminal.tool_type.is_some_and(|t| t != ToolType::Primitive) {
        issues.push(format!(
            "{} terminates the chain but is not a primitive",
            terminal.item_id
        ));
    }
}
