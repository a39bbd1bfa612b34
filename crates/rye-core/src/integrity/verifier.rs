//! Integrity verification with a fingerprint-validated result cache.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::hashing::{
    compute_directive_integrity, compute_knowledge_integrity, compute_tool_integrity,
    hash_matches,
};
use crate::cache::{CacheStats, Fingerprint, FingerprintCache};
use crate::config::RyeConfig;
use crate::errors::{RyeError, RyeResult};
use crate::extract::source::parse_module;
use crate::extract::{scalar_string, Extractor, SourceLanguage};
use crate::models::ItemType;

const DEFAULT_VERSION: &str = "0.0.0";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub expected_hash: Option<String>,
    pub actual_hash: Option<String>,
    pub error: Option<String>,
    pub cached: bool,
}

impl VerificationResult {
    fn failed(expected: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            expected_hash: expected.map(str::to_string),
            actual_hash: None,
            error: Some(error.into()),
            cached: false,
        }
    }

    fn judged(expected: Option<&str>, actual: String) -> Self {
        Self {
            valid: expected_satisfied(expected, &actual),
            expected_hash: expected.map(str::to_string),
            actual_hash: Some(actual),
            error: None,
            cached: false,
        }
    }
}

fn expected_satisfied(expected: Option<&str>, actual: &str) -> bool {
    match expected.map(str::trim).filter(|e| !e.is_empty()) {
        Some(expected) => hash_matches(expected, actual),
        None => true,
    }
}

#[derive(Clone)]
struct CachedHash {
    item_type: ItemType,
    actual_hash: String,
}

/// Verifies item files against expected hashes.
///
/// Computed hashes are cached per absolute path and stay valid while the
/// file's `(mtime, size)` fingerprint is unchanged and the TTL has not run
/// out.  Failures are never cached.
pub struct IntegrityVerifier {
    cache: FingerprintCache<CachedHash>,
}

impl IntegrityVerifier {
    pub fn new(ttl: Duration, max_cache_size: usize) -> Self {
        Self {
            cache: FingerprintCache::new(ttl, max_cache_size),
        }
    }

    pub fn from_config(config: &RyeConfig) -> Self {
        Self::new(config.cache_ttl, config.max_cache_size)
    }

    pub fn verify(
        &self,
        path: &Path,
        item_type: ItemType,
        expected_hash: Option<&str>,
    ) -> VerificationResult {
        let key = cache_key(path);
        let before = Fingerprint::of(path);

        if let Some(hit) = self.cache.get(&key, before.as_ref()) {
            if hit.item_type == item_type {
                let mut result = VerificationResult::judged(expected_hash, hit.actual_hash);
                result.cached = true;
                return result;
            }
        }

        let actual = match std::fs::read_to_string(path)
            .map_err(RyeError::from)
            .and_then(|content| hash_item(path, item_type, &content))
        {
            Ok(actual) => actual,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "integrity check failed");
                return VerificationResult::failed(expected_hash, err.to_string());
            }
        };

        // Only cache when the file was stable across the read.
        match (before, Fingerprint::of(path)) {
            (Some(before), Some(after)) if before == after => {
                self.cache.insert(
                    key,
                    CachedHash {
                        item_type,
                        actual_hash: actual.clone(),
                    },
                    after,
                );
            }
            _ => debug!(path = %path.display(), "file changed during verification, not cached"),
        }

        VerificationResult::judged(expected_hash, actual)
    }

    pub fn verify_tool(&self, path: &Path, expected_hash: Option<&str>) -> VerificationResult {
        self.verify(path, ItemType::Tool, expected_hash)
    }

    pub fn verify_directive(&self, path: &Path, expected_hash: Option<&str>) -> VerificationResult {
        self.verify(path, ItemType::Directive, expected_hash)
    }

    pub fn verify_knowledge(&self, path: &Path, expected_hash: Option<&str>) -> VerificationResult {
        self.verify(path, ItemType::Knowledge, expected_hash)
    }

    /// Hash a file without consulting or filling the cache.
    pub fn compute_hash(&self, path: &Path, item_type: ItemType) -> RyeResult<String> {
        let content = std::fs::read_to_string(path)?;
        hash_item(path, item_type, &content)
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        self.cache.invalidate(&cache_key(path))
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn cache_key(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .into_owned()
}

static DIRECTIVE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<directive[^>]+name=["']([^"']+)["']"#).unwrap());

static DIRECTIVE_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<directive[^>]+version=["']([^"']+)["']"#).unwrap());

static FRONTMATTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A---\s*\n(.*?)\n---\s*\n").unwrap());

/// Source names whose constant values identify a tool for hashing.
const TOOL_IDENTITY_FIELDS: &[(&str, &str)] =
    &[("__version__", "version"), ("__tool_type__", "tool_type")];

fn hash_item(path: &Path, item_type: ItemType, content: &str) -> RyeResult<String> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let hash = match item_type {
        ItemType::Tool => {
            let manifest = tool_identity(path, content, &stem);
            let version = identity_version(&manifest);
            compute_tool_integrity(&stem, &version, &Value::Object(manifest), None)
        }
        ItemType::Directive => {
            let metadata = directive_identity(content);
            let name = metadata.get("name").and_then(scalar_string).unwrap_or(stem);
            let version = identity_version(&metadata);
            compute_directive_integrity(&name, &version, content, Some(&Value::Object(metadata)))
        }
        ItemType::Knowledge => {
            let metadata = knowledge_identity(content);
            let id = metadata.get("id").and_then(scalar_string).unwrap_or(stem);
            let version = identity_version(&metadata);
            compute_knowledge_integrity(&id, &version, content, Some(&Value::Object(metadata)))
        }
    };
    Ok(hash)
}

fn identity_version(metadata: &Map<String, Value>) -> String {
    metadata
        .get("version")
        .and_then(scalar_string)
        .unwrap_or_else(|| DEFAULT_VERSION.to_string())
}

/// `{tool_id, version?, tool_type?}` from the tool's declared constants.
///
/// A source that does not parse contributes only its `tool_id`.
fn tool_identity(path: &Path, content: &str, stem: &str) -> Map<String, Value> {
    let mut manifest = Map::new();
    manifest.insert("tool_id".to_string(), Value::String(stem.to_string()));

    if let Some(language) = SourceLanguage::for_path(path) {
        let Ok(module) = parse_module(content, language) else {
            return manifest;
        };
        for assignment in module.assignments.iter().filter(|a| a.constant) {
            if let Some((_, field)) = TOOL_IDENTITY_FIELDS
                .iter()
                .find(|(declared, _)| *declared == assignment.name)
            {
                manifest.insert((*field).to_string(), assignment.value.clone());
            }
        }
        return manifest;
    }

    // Structured manifests declare the same fields at the top level.
    let Some(Ok(fields)) = Extractor::for_tool(path).map(|e| e.extract(content)) else {
        return manifest;
    };
    for (_, field) in TOOL_IDENTITY_FIELDS {
        if let Some(value) = fields.get(*field).filter(|v| scalar_string(v).is_some()) {
            manifest.insert((*field).to_string(), value.clone());
        }
    }
    manifest
}

fn directive_identity(content: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    for (key, re) in [("name", &DIRECTIVE_NAME_RE), ("version", &DIRECTIVE_VERSION_RE)] {
        if let Some(m) = re.captures(content).and_then(|c| c.get(1)) {
            metadata.insert(key.to_string(), Value::String(m.as_str().to_string()));
        }
    }
    metadata
}

/// Frontmatter mapping, or an empty map when it is absent or not a mapping.
fn knowledge_identity(content: &str) -> Map<String, Value> {
    let Some(raw) = FRONTMATTER_RE.captures(content).and_then(|c| c.get(1)) else {
        return Map::new();
    };
    match serde_yaml::from_str::<Value>(raw.as_str()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
