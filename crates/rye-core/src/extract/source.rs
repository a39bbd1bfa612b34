//! Module-level literal assignments in tool source files.
//!
//! Python and JavaScript sources are parsed with tree-sitter and only the
//! statements that sit directly under the module root are considered, so an
//! assignment inside a function body, a conditional block or a string never
//! counts.  Right-hand sides are evaluated as literals (strings, numbers,
//! booleans, null, lists, tuples and dict/object literals); any other
//! expression is skipped.  Nothing is executed.
//!
//! Shell tools have no grammar in the stack, so they get a line scanner that
//! tracks quoting, brace nesting and heredoc bodies.

use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value};
use tree_sitter::{Language, Node, Parser, Tree};

use crate::errors::{RyeError, RyeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Python,
    JavaScript,
    Shell,
}

impl SourceLanguage {
    pub fn for_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "py" => Some(SourceLanguage::Python),
            "js" => Some(SourceLanguage::JavaScript),
            "sh" => Some(SourceLanguage::Shell),
            _ => None,
        }
    }
}

/// One `NAME = <literal>` statement at module level.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Value,
    /// The right-hand side is a single scalar constant rather than a
    /// container or an operator applied to one.
    pub constant: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceModule {
    /// In source order; a name assigned twice appears twice.
    pub assignments: Vec<Assignment>,
    pub docstring: Option<String>,
}

impl SourceModule {
    /// Last literal assigned to each name.
    pub fn values(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for assignment in &self.assignments {
            out.insert(assignment.name.clone(), assignment.value.clone());
        }
        out
    }
}

/// Parse `content` and collect its module-level literal assignments.
///
/// Python and JavaScript sources with syntax errors are rejected.
pub fn parse_module(content: &str, language: SourceLanguage) -> RyeResult<SourceModule> {
    match language {
        SourceLanguage::Python => python_module(content),
        SourceLanguage::JavaScript => javascript_module(content),
        SourceLanguage::Shell => Ok(SourceModule {
            assignments: shell_assignments(content),
            docstring: None,
        }),
    }
}

fn parse_tree(content: &str, language: Language) -> RyeResult<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| RyeError::Parse(format!("failed to set language: {e}")))?;
    let tree = parser
        .parse(content.as_bytes(), None)
        .ok_or_else(|| RyeError::Parse("source could not be parsed".to_string()))?;
    if tree.root_node().has_error() {
        return Err(RyeError::Parse("source has syntax errors".to_string()));
    }
    Ok(tree)
}

fn text<'a>(node: Node<'_>, src: &'a str) -> &'a str {
    src.get(node.byte_range()).unwrap_or_default()
}

/// Named children other than comments.
fn operands<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

const PYTHON_CONSTANTS: &[&str] = &[
    "string",
    "concatenated_string",
    "integer",
    "float",
    "true",
    "false",
    "none",
];

fn python_module(content: &str) -> RyeResult<SourceModule> {
    let tree = parse_tree(content, tree_sitter_python::LANGUAGE.into())?;
    let statements = operands(tree.root_node());

    let docstring = statements
        .first()
        .filter(|statement| statement.kind() == "expression_statement")
        .and_then(|statement| statement.named_child(0))
        .filter(|expr| matches!(expr.kind(), "string" | "concatenated_string"))
        .and_then(|expr| match python_value(expr, content) {
            Some(Value::String(doc)) => Some(doc.trim().to_string()),
            _ => None,
        });

    let mut assignments = Vec::new();
    for statement in statements {
        if statement.kind() != "expression_statement" || statement.named_child_count() != 1 {
            continue;
        }
        let Some(assignment) = statement.named_child(0) else {
            continue;
        };
        // Annotated assignments (`X: str = ...`) are declarations, not plain bindings.
        if assignment.kind() != "assignment" || assignment.child_by_field_name("type").is_some() {
            continue;
        }
        let (Some(left), Some(right)) = (
            assignment.child_by_field_name("left"),
            assignment.child_by_field_name("right"),
        ) else {
            continue;
        };
        if left.kind() != "identifier" {
            continue;
        }
        if let Some(value) = python_value(right, content) {
            assignments.push(Assignment {
                name: text(left, content).to_string(),
                constant: PYTHON_CONSTANTS.contains(&right.kind()),
                value,
            });
        }
    }
    Ok(SourceModule {
        assignments,
        docstring,
    })
}

fn python_value(node: Node<'_>, src: &str) -> Option<Value> {
    match node.kind() {
        "string" => python_string(node, src).map(Value::String),
        "concatenated_string" => {
            let mut out = String::new();
            for part in operands(node) {
                out.push_str(&python_string(part, src)?);
            }
            Some(Value::String(out))
        }
        "integer" => python_integer(text(node, src)),
        "float" => float_value(text(node, src)),
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "none" => Some(Value::Null),
        "list" | "tuple" => operands(node)
            .into_iter()
            .map(|item| python_value(item, src))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        "dictionary" => {
            let mut map = Map::new();
            for pair in operands(node) {
                if pair.kind() != "pair" {
                    return None;
                }
                let key = python_value(pair.child_by_field_name("key")?, src)?;
                let value = python_value(pair.child_by_field_name("value")?, src)?;
                map.insert(key_string(key)?, value);
            }
            Some(Value::Object(map))
        }
        "parenthesized_expression" => match operands(node).as_slice() {
            [inner] => python_value(*inner, src),
            _ => None,
        },
        "unary_operator" => signed(
            text(node.child_by_field_name("operator")?, src),
            python_value(node.child_by_field_name("argument")?, src)?,
        ),
        _ => None,
    }
}

fn python_string(node: Node<'_>, src: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    if children.iter().any(|child| child.kind() == "interpolation") {
        return None;
    }
    let start = children.iter().find(|child| child.kind() == "string_start")?;
    let end = children.iter().rev().find(|child| child.kind() == "string_end")?;
    let prefix = text(*start, src)
        .trim_end_matches(['\'', '"'])
        .to_ascii_lowercase();
    // f-strings are expressions and bytes are not text.
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let body = src.get(start.end_byte()..end.start_byte())?;
    Some(if prefix.contains('r') {
        body.to_string()
    } else {
        unescape(body, Dialect::Python)
    })
}

fn python_integer(raw: &str) -> Option<Value> {
    let digits = raw.replace('_', "").to_ascii_lowercase();
    if digits.ends_with('j') {
        return None;
    }
    radix_integer(&digits).or_else(|| digits.parse::<i64>().ok().map(Value::from))
}

// ---------------------------------------------------------------------------
// JavaScript
// ---------------------------------------------------------------------------

const JAVASCRIPT_CONSTANTS: &[&str] = &[
    "string",
    "template_string",
    "number",
    "true",
    "false",
    "null",
    "undefined",
];

fn javascript_module(content: &str) -> RyeResult<SourceModule> {
    let tree = parse_tree(content, tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?;
    let mut bindings: Vec<(Node<'_>, Node<'_>)> = Vec::new();
    for statement in operands(tree.root_node()) {
        let statement = if statement.kind() == "export_statement" {
            match statement.child_by_field_name("declaration") {
                Some(declaration) => declaration,
                None => continue,
            }
        } else {
            statement
        };
        match statement.kind() {
            "lexical_declaration" | "variable_declaration" => {
                for declarator in operands(statement) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    if let (Some(name), Some(value)) = (
                        declarator.child_by_field_name("name"),
                        declarator.child_by_field_name("value"),
                    ) {
                        bindings.push((name, value));
                    }
                }
            }
            "expression_statement" => {
                let Some(expr) = statement.named_child(0) else {
                    continue;
                };
                if expr.kind() != "assignment_expression" {
                    continue;
                }
                if let (Some(left), Some(right)) = (
                    expr.child_by_field_name("left"),
                    expr.child_by_field_name("right"),
                ) {
                    bindings.push((left, right));
                }
            }
            _ => {}
        }
    }

    let assignments = bindings
        .into_iter()
        .filter(|(name, _)| name.kind() == "identifier")
        .filter_map(|(name, value)| {
            Some(Assignment {
                name: text(name, content).to_string(),
                constant: JAVASCRIPT_CONSTANTS.contains(&value.kind()),
                value: javascript_value(value, content)?,
            })
        })
        .collect();
    Ok(SourceModule {
        assignments,
        docstring: None,
    })
}

fn javascript_value(node: Node<'_>, src: &str) -> Option<Value> {
    match node.kind() {
        "string" => quoted_body(text(node, src)).map(|body| Value::String(unescape(body, Dialect::JavaScript))),
        "template_string" => {
            if operands(node).iter().any(|part| part.kind() == "template_substitution") {
                return None;
            }
            quoted_body(text(node, src)).map(|body| Value::String(unescape(body, Dialect::JavaScript)))
        }
        "number" => {
            let digits = text(node, src).replace('_', "").to_ascii_lowercase();
            radix_integer(&digits)
                .or_else(|| digits.parse::<i64>().ok().map(Value::from))
                .or_else(|| float_value(&digits))
        }
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" | "undefined" => Some(Value::Null),
        "identifier" if text(node, src) == "undefined" => Some(Value::Null),
        "array" => operands(node)
            .into_iter()
            .map(|item| javascript_value(item, src))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        "object" => {
            let mut map = Map::new();
            for pair in operands(node) {
                if pair.kind() != "pair" {
                    return None;
                }
                let key = pair.child_by_field_name("key")?;
                let key = match key.kind() {
                    "property_identifier" | "number" => text(key, src).to_string(),
                    "string" => unescape(quoted_body(text(key, src))?, Dialect::JavaScript),
                    _ => return None,
                };
                let value = javascript_value(pair.child_by_field_name("value")?, src)?;
                map.insert(key, value);
            }
            Some(Value::Object(map))
        }
        // `(...)`, `... as const` and `... satisfies T` wrap a single value.
        "parenthesized_expression" | "as_expression" | "satisfies_expression" => {
            javascript_value(*operands(node).first()?, src)
        }
        "unary_expression" => signed(
            text(node.child_by_field_name("operator")?, src),
            javascript_value(node.child_by_field_name("argument")?, src)?,
        ),
        _ => None,
    }
}

fn quoted_body(literal: &str) -> Option<&str> {
    let inner = literal.get(1..literal.len().checked_sub(1)?)?;
    Some(inner)
}

// ---------------------------------------------------------------------------
// Shared literal helpers
// ---------------------------------------------------------------------------

fn radix_integer(digits: &str) -> Option<Value> {
    let (radix, rest) = if let Some(rest) = digits.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = digits.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = digits.strip_prefix("0b") {
        (2, rest)
    } else {
        return None;
    };
    i64::from_str_radix(rest, radix).ok().map(Value::from)
}

fn float_value(raw: &str) -> Option<Value> {
    let cleaned = raw.replace('_', "");
    if cleaned.ends_with(['j', 'J']) {
        return None;
    }
    let parsed: f64 = cleaned.parse().ok()?;
    Number::from_f64(parsed).map(Value::Number)
}

fn signed(operator: &str, operand: Value) -> Option<Value> {
    let Value::Number(n) = operand else {
        return None;
    };
    match operator {
        "+" => Some(Value::Number(n)),
        "-" => match n.as_i64() {
            Some(i) => i.checked_neg().map(Value::from),
            None => Number::from_f64(-n.as_f64()?).map(Value::Number),
        },
        _ => None,
    }
}

fn key_string(key: Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Dialect {
    Python,
    JavaScript,
}

fn unescape(body: &str, dialect: Dialect) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push('\\');
            break;
        };
        match esc {
            '\n' => {}
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            '\\' | '\'' | '"' | '`' => out.push(esc),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            'a' if matches!(dialect, Dialect::Python) => out.push('\u{07}'),
            '0'..='7' if matches!(dialect, Dialect::Python) => {
                let mut digits = esc.to_string();
                digits.push_str(&take_digits(&mut chars, 2, 8));
                push_code(&mut out, &digits, 8);
            }
            '0' => out.push('\0'),
            'x' => {
                let digits = take_digits(&mut chars, 2, 16);
                push_code(&mut out, &digits, 16);
            }
            'u' if matches!(dialect, Dialect::JavaScript) && chars.peek() == Some(&'{') => {
                chars.next();
                let digits: String = chars.by_ref().take_while(|c| *c != '}').collect();
                push_code(&mut out, &digits, 16);
            }
            'u' => {
                let digits = take_digits(&mut chars, 4, 16);
                push_code(&mut out, &digits, 16);
            }
            'U' if matches!(dialect, Dialect::Python) => {
                let digits = take_digits(&mut chars, 8, 16);
                push_code(&mut out, &digits, 16);
            }
            other => {
                if matches!(dialect, Dialect::Python) {
                    out.push('\\');
                }
                out.push(other);
            }
        }
    }
    out
}

fn take_digits(chars: &mut Peekable<Chars<'_>>, max: usize, radix: u32) -> String {
    let mut digits = String::new();
    while digits.len() < max {
        match chars.next_if(|c| c.is_digit(radix)) {
            Some(c) => digits.push(c),
            None => break,
        }
    }
    digits
}

fn push_code(out: &mut String, digits: &str, radix: u32) {
    match u32::from_str_radix(digits, radix).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push(char::REPLACEMENT_CHARACTER),
    }
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

static SHELL_ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+|readonly\s+|declare\s+(?:-[A-Za-z]+\s+)?)?([A-Za-z_][A-Za-z0-9_]*)=(.*)$")
        .unwrap()
});

static HEREDOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<<-?[ \t]*['"]?([A-Za-z_][A-Za-z0-9_]*)['"]?"#).unwrap()
});

#[derive(Default)]
struct ShellScanner {
    quote: Option<char>,
    depth: usize,
    heredoc: Option<String>,
}

impl ShellScanner {
    fn at_top_level(&self) -> bool {
        self.quote.is_none() && self.depth == 0 && self.heredoc.is_none()
    }

    /// Advance quote and brace state over one physical line.
    fn consume(&mut self, line: &str) {
        if let Some(delimiter) = &self.heredoc {
            if line.trim_start_matches('\t') == delimiter.as_str() {
                self.heredoc = None;
            }
            return;
        }
        let mut chars = line.chars().peekable();
        let mut previous = ' ';
        while let Some(c) = chars.next() {
            match self.quote {
                Some('\'') => {
                    if c == '\'' {
                        self.quote = None;
                    }
                }
                Some(_) => match c {
                    '\\' => {
                        chars.next();
                    }
                    '"' => self.quote = None,
                    _ => {}
                },
                None => match c {
                    '#' if previous.is_whitespace() => break,
                    '\\' => {
                        chars.next();
                    }
                    '\'' | '"' => self.quote = Some(c),
                    '$' if chars.peek() == Some(&'{') => {
                        // Parameter expansion; its braces are not blocks.
                        chars.next();
                        for inner in chars.by_ref() {
                            if inner == '}' {
                                break;
                            }
                        }
                    }
                    '{' | '(' if previous != '$' => self.depth += 1,
                    '}' | ')' => self.depth = self.depth.saturating_sub(1),
                    _ => {}
                },
            }
            previous = c;
        }
        if self.quote.is_none() {
            if let Some(caps) = HEREDOC_RE.captures(line) {
                self.heredoc = Some(caps[1].to_string());
            }
        }
    }
}

fn shell_assignments(content: &str) -> Vec<Assignment> {
    let mut scanner = ShellScanner::default();
    let mut found = Vec::new();
    for line in content.lines() {
        if scanner.at_top_level() {
            if let Some(caps) = SHELL_ASSIGNMENT_RE.captures(line.trim()) {
                if let Some(value) = shell_value(&caps[2]) {
                    found.push(Assignment {
                        name: caps[1].to_string(),
                        value: Value::String(value),
                        constant: true,
                    });
                }
            }
        }
        scanner.consume(line);
    }
    found
}

/// A single-word shell value with no expansions, or `None`.
fn shell_value(raw: &str) -> Option<String> {
    let statement_end = |rest: &str| {
        let rest = rest.trim_start();
        rest.is_empty() || rest.starts_with('#') || rest.starts_with(';')
    };
    let mut chars = raw.char_indices();
    match chars.next() {
        None => Some(String::new()),
        Some((_, '\'')) => {
            let close = raw[1..].find('\'')? + 1;
            statement_end(&raw[close + 1..]).then(|| raw[1..close].to_string())
        }
        Some((_, '"')) => {
            let mut out = String::new();
            let mut escaped = false;
            for (i, c) in chars {
                if escaped {
                    if !matches!(c, '"' | '\\' | '$' | '`') {
                        out.push('\\');
                    }
                    out.push(c);
                    escaped = false;
                    continue;
                }
                match c {
                    '\\' => escaped = true,
                    '$' | '`' => return None,
                    '"' => return statement_end(&raw[i + 1..]).then_some(out),
                    _ => out.push(c),
                }
            }
            None
        }
        Some(_) => {
            let end = raw.find(|c: char| c.is_whitespace() || c == ';').unwrap_or(raw.len());
            let word = &raw[..end];
            if word.contains(['$', '`', '(', ')', '<', '>', '|', '&', '\'', '"', '\\']) {
                return None;
            }
            statement_end(&raw[end..]).then(|| word.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(content: &str, language: SourceLanguage) -> Map<String, Value> {
        parse_module(content, language).unwrap().values()
    }

    #[test]
    fn test_python_scalars() {
        let src = r#"
A = '1.0.0'
B = "a\nb"
C = None
D = True
E = -42
F = 3.5
G = 0x1F
H = r'\d+'
I = 1_000
"#;
        let found = values(src, SourceLanguage::Python);
        assert_eq!(found["A"], json!("1.0.0"));
        assert_eq!(found["B"], json!("a\nb"));
        assert_eq!(found["C"], Value::Null);
        assert_eq!(found["D"], json!(true));
        assert_eq!(found["E"], json!(-42));
        assert_eq!(found["F"], json!(3.5));
        assert_eq!(found["G"], json!(31));
        assert_eq!(found["H"], json!("\\d+"));
        assert_eq!(found["I"], json!(1000));
    }

    #[test]
    fn test_python_nested_dict_with_comments_and_trailing_commas() {
        let src = r#"ENV_CONFIG = {
    "interpreter": {
        "type": "venv_python",  # where to look
        "search": ["project", "user"],
        "fallback": "python3",
    },
    "env": {"PYTHONUNBUFFERED": "1"},
    'timeout': 30,
}
"#;
        let found = values(src, SourceLanguage::Python);
        let config = &found["ENV_CONFIG"];
        assert_eq!(config["interpreter"]["type"], json!("venv_python"));
        assert_eq!(config["interpreter"]["search"], json!(["project", "user"]));
        assert_eq!(config["env"]["PYTHONUNBUFFERED"], json!("1"));
        assert_eq!(config["timeout"], json!(30));

        let keys: Vec<&String> = config.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["interpreter", "env", "timeout"]);
    }

    #[test]
    fn test_python_tuples_concatenation_and_triple_quotes() {
        let src = "T = (1, 'x',)\nS = ('abc' 'def')\nQ = \"\"\"line one\nline two\"\"\"\n";
        let found = values(src, SourceLanguage::Python);
        assert_eq!(found["T"], json!([1, "x"]));
        assert_eq!(found["S"], json!("abcdef"));
        assert_eq!(found["Q"], json!("line one\nline two"));
    }

    #[test]
    fn test_python_skips_expressions_and_nested_scopes() {
        let src = r#"#!/usr/bin/env python3
"""Run a shell command."""
import logging
import os

__version__ = "1.2.0"
__executor_id__ = "rye/core/runtimes/python_runtime"
LOGGER = logging.getLogger(__name__)
HOME = {"path": os.environ}
NAME = f"tool-{__version__}"
TIMEOUT: int = 30
CONFIG = {
    "command": "echo ${MSG}",
    "timeout": 30,
}

if os.name == "nt":
    __executor_id__ = "windows"

def main():
    local = "ignored"
"#;
        let module = parse_module(src, SourceLanguage::Python).unwrap();
        let found = module.values();
        assert_eq!(found["__version__"], json!("1.2.0"));
        assert_eq!(found["__executor_id__"], json!("rye/core/runtimes/python_runtime"));
        assert_eq!(found["CONFIG"]["timeout"], json!(30));
        for skipped in ["LOGGER", "HOME", "NAME", "TIMEOUT", "local"] {
            assert!(!found.contains_key(skipped), "{skipped} should be skipped");
        }
        assert_eq!(module.docstring.as_deref(), Some("Run a shell command."));
    }

    #[test]
    fn test_python_assignment_text_inside_string_is_not_a_declaration() {
        let src = r#""""Deploy helper.

Example:
    __executor_id__ = "example/in/docstring"
"""
__version__ = "1.0.0"
__executor_id__ = "rye/core/runtimes/python_runtime"

HELP = """
Override the runtime like this:
__executor_id__ = "attacker/payload"
__version__ = "9.9.9"
"""
"#;
        let found = values(src, SourceLanguage::Python);
        assert_eq!(found["__executor_id__"], json!("rye/core/runtimes/python_runtime"));
        assert_eq!(found["__version__"], json!("1.0.0"));
        assert!(found["HELP"].as_str().unwrap().contains("attacker/payload"));
    }

    #[test]
    fn test_python_constant_flag() {
        let src = "__version__ = '1.0'\nNEG = -1\nITEMS = ['a']\nPARTS = 'a' 'b'\n";
        let module = parse_module(src, SourceLanguage::Python).unwrap();
        let constant: Vec<(&str, bool)> = module
            .assignments
            .iter()
            .map(|a| (a.name.as_str(), a.constant))
            .collect();
        assert_eq!(
            constant,
            [("__version__", true), ("NEG", false), ("ITEMS", false), ("PARTS", true)]
        );
    }

    #[test]
    fn test_python_syntax_error_is_rejected() {
        assert!(parse_module("__version__ = '1.0\n", SourceLanguage::Python).is_err());
        assert!(parse_module("def broken(:\n    pass\n", SourceLanguage::Python).is_err());
    }

    #[test]
    fn test_python_docstring() {
        let src = "#!/usr/bin/env python3\n# helper\n\n\"\"\"\nFetch a URL.\n\"\"\"\n__version__ = '1'\n";
        let module = parse_module(src, SourceLanguage::Python).unwrap();
        assert_eq!(module.docstring.as_deref(), Some("Fetch a URL."));

        let module = parse_module("x = 1\n\"\"\"Not a docstring.\"\"\"\n", SourceLanguage::Python).unwrap();
        assert_eq!(module.docstring, None);
    }

    #[test]
    fn test_javascript_declarations() {
        let src = r#"// Fetch helper
export const __version__ = '0.3.1';
const CONFIG = { port: 8080, "host": `localhost`, tags: ['a', "b"], retry: -1 };
let __executor_id__ = "rye/core/runtimes/node_runtime";
var TOOL_TYPE = null;
const DERIVED = `v${__version__}`;
const CALL = require("fs");

function main() {
  const inner = "ignored";
}
"#;
        let found = values(src, SourceLanguage::JavaScript);
        assert_eq!(found["__version__"], json!("0.3.1"));
        assert_eq!(
            found["CONFIG"],
            json!({"port": 8080, "host": "localhost", "tags": ["a", "b"], "retry": -1})
        );
        assert_eq!(found["__executor_id__"], json!("rye/core/runtimes/node_runtime"));
        assert_eq!(found["TOOL_TYPE"], Value::Null);
        assert!(!found.contains_key("DERIVED"));
        assert!(!found.contains_key("CALL"));
        assert!(!found.contains_key("inner"));
    }

    #[test]
    fn test_shell_assignments() {
        let src = r#"#!/bin/bash
# __version__="0.0.0"
__version__="2.0.0"
export __tool_type__='primitive'
CATEGORY=rye/core # inline comment
NAME=$(whoami)
GREETING="hello $USER"

usage() {
  __version__="9.9.9"
}

cat <<EOF
__executor_id__=from-heredoc
EOF

HELP="
__executor_id__=from-string
"
__executor_id__=rye/core/primitives/subprocess
"#;
        let found = values(src, SourceLanguage::Shell);
        assert_eq!(found["__version__"], json!("2.0.0"));
        assert_eq!(found["__tool_type__"], json!("primitive"));
        assert_eq!(found["CATEGORY"], json!("rye/core"));
        assert_eq!(found["__executor_id__"], json!("rye/core/primitives/subprocess"));
        assert!(!found.contains_key("NAME"));
        assert!(!found.contains_key("GREETING"));
        assert!(!found.contains_key("HELP"));
    }

    #[test]
    fn test_language_for_path() {
        assert_eq!(SourceLanguage::for_path(Path::new("a/b.py")), Some(SourceLanguage::Python));
        assert_eq!(SourceLanguage::for_path(Path::new("b.js")), Some(SourceLanguage::JavaScript));
        assert_eq!(SourceLanguage::for_path(Path::new("b.sh")), Some(SourceLanguage::Shell));
        assert_eq!(SourceLanguage::for_path(Path::new("b.yaml")), None);
    }
}
