//! Execution chain resolution and hand-off to terminal primitives.
//!
//! A tool id resolves to a file in the first space (project, user, system)
//! whose `tools` directory holds it.  Its declared `executor_id` names the
//! next link; links are followed until one declares no executor.  Built
//! chains are cached per root id and reused while every link's file
//! fingerprint is unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::template::template_config;
use super::validator::{ChainValidator, ValidationResult};
use crate::cache::{Fingerprint, FingerprintCache};
use crate::config::{RyeConfig, MAX_CHAIN_DEPTH};
use crate::env::{Env, EnvResolver};
use crate::errors::{RyeError, RyeResult};
use crate::extract::{ToolManifest, TOOL_EXTENSIONS};
use crate::models::{ChainElement, ExecutionResult, ItemType, Space, ToolType};

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// A terminal executable unit such as a subprocess runner or HTTP client.
pub trait Primitive: Send + Sync {
    fn execute(&self, config: &Value) -> ExecutionResult;
}

/// Primitives available for dispatch, keyed by item id.
#[derive(Clone, Default)]
pub struct PrimitiveRegistry {
    primitives: HashMap<String, Arc<dyn Primitive>>,
}

impl PrimitiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, primitive: impl Primitive + 'static) {
        self.primitives.insert(id.into(), Arc::new(primitive));
    }

    /// Look up by full item id, then by its last path segment
    /// (`rye/core/primitives/subprocess` finds `subprocess`).
    pub fn get(&self, item_id: &str) -> Option<Arc<dyn Primitive>> {
        self.primitives
            .get(item_id)
            .or_else(|| {
                let short = item_id.rsplit('/').next()?;
                self.primitives.get(short)
            })
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// A candidate file and its fingerprint when it was last seen.
type SeenFile = (PathBuf, Option<Fingerprint>);

#[derive(Clone)]
struct CachedChain {
    chain: Vec<ChainElement>,
    fingerprints: Vec<Option<Fingerprint>>,
    /// Higher-precedence candidates for the root that failed to load.
    skipped: Vec<SeenFile>,
}

/// A resolved tool file plus the earlier candidates that were passed over.
struct Resolved {
    path: PathBuf,
    space: Space,
    manifest: ToolManifest,
    skipped: Vec<SeenFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutorCacheStats {
    pub chain_cache_size: usize,
    pub metadata_cache_size: usize,
    pub chain_cache_hits: u64,
}

pub struct PrimitiveExecutor {
    config: RyeConfig,
    metadata_cache: FingerprintCache<ToolManifest>,
    chain_cache: FingerprintCache<CachedChain>,
    validator: ChainValidator,
    env_resolver: EnvResolver,
}

impl PrimitiveExecutor {
    pub fn new(config: RyeConfig) -> Self {
        let env_resolver = EnvResolver::from_config(&config);
        Self {
            metadata_cache: FingerprintCache::new(config.cache_ttl, config.max_cache_size),
            chain_cache: FingerprintCache::new(config.cache_ttl, config.max_cache_size),
            validator: ChainValidator::new(),
            env_resolver,
            config,
        }
    }

    pub fn with_env_resolver(mut self, env_resolver: EnvResolver) -> Self {
        self.env_resolver = env_resolver;
        self
    }

    pub fn config(&self) -> &RyeConfig {
        &self.config
    }

    /// Candidate files for `item_id` in precedence order: exact
    /// `<tools>/<item_id>.<ext>` paths first, then any file below the tools
    /// directory whose extension-less relative path ends with `item_id`.
    pub fn resolve_candidates(&self, item_id: &str) -> Vec<(PathBuf, Space)> {
        let mut candidates = Vec::new();
        for (dir, space) in self.config.type_dirs(ItemType::Tool) {
            for ext in TOOL_EXTENSIONS {
                let path = dir.join(format!("{item_id}.{ext}"));
                if path.is_file() {
                    candidates.push((path, space));
                }
            }
            for path in walk_matches(&dir, item_id) {
                if !candidates.iter().any(|(p, _)| *p == path) {
                    candidates.push((path, space));
                }
            }
        }
        candidates
    }

    /// First candidate for `item_id` whose metadata loads.
    pub fn resolve_tool_path(&self, item_id: &str) -> Option<(PathBuf, Space)> {
        self.resolve_manifest(item_id)
            .map(|resolved| (resolved.path, resolved.space))
    }

    /// Static metadata of a tool file, cached against its fingerprint.
    /// `None` when the file cannot be read or parsed.
    pub fn load_metadata(&self, path: &Path) -> Option<ToolManifest> {
        let key = path.to_string_lossy();
        let fingerprint = Fingerprint::of(path);
        if let Some(manifest) = self.metadata_cache.get(&key, fingerprint.as_ref()) {
            return Some(manifest);
        }

        match ToolManifest::load(path) {
            Ok(manifest) => {
                // Only cache what was read from a file that held still.
                if let Some(fp) = fingerprint.filter(|fp| Fingerprint::of(path) == Some(*fp)) {
                    self.metadata_cache.insert(key.into_owned(), manifest.clone(), fp);
                }
                Some(manifest)
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "metadata extraction failed, skipping");
                None
            }
        }
    }

    /// Resolve `item_id` into its chain, tool first and primitive last.
    ///
    /// An unresolvable id, or a link whose executor cannot be resolved,
    /// yields an empty chain.  Cycles and chains longer than
    /// [`MAX_CHAIN_DEPTH`] are errors.
    pub fn build_chain(&self, item_id: &str, force_refresh: bool) -> RyeResult<Vec<ChainElement>> {
        if !force_refresh {
            if let Some(chain) = self.cached_chain(item_id) {
                debug!(item_id, depth = chain.len(), "chain cache hit");
                return Ok(chain);
            }
        }

        let mut chain: Vec<ChainElement> = Vec::new();
        let mut skipped = Vec::new();
        let mut current = item_id.to_string();
        loop {
            if chain.iter().any(|e| e.item_id == current) {
                let mut path: Vec<&str> = chain.iter().map(|e| e.item_id.as_str()).collect();
                path.push(&current);
                return Err(RyeError::CircularDependency {
                    item_id: current.clone(),
                    chain: path.join(" -> "),
                });
            }
            if chain.len() >= MAX_CHAIN_DEPTH {
                return Err(RyeError::ChainTooDeep {
                    item_id: item_id.to_string(),
                    max_depth: MAX_CHAIN_DEPTH,
                });
            }

            let Some(resolved) = self.resolve_manifest(&current) else {
                if chain.is_empty() {
                    debug!(item_id, "tool not found");
                } else {
                    warn!(item_id, executor_id = %current, "executor not found, chain unresolvable");
                }
                return Ok(Vec::new());
            };

            if chain.is_empty() {
                skipped = resolved.skipped;
            }
            let element = chain_element(current, resolved.space, resolved.path, resolved.manifest);
            let next = element.executor_id.clone();
            chain.push(element);
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        let fingerprints: Vec<Option<Fingerprint>> =
            chain.iter().map(|e| Fingerprint::of(&e.path)).collect();
        if let Some(Some(root)) = fingerprints.first() {
            self.chain_cache.insert(
                item_id,
                CachedChain {
                    chain: chain.clone(),
                    fingerprints: fingerprints.clone(),
                    skipped,
                },
                *root,
            );
        }
        info!(item_id, depth = chain.len(), refreshed = force_refresh, "chain built");
        Ok(chain)
    }

    pub fn validate_chain(&self, chain: &[ChainElement]) -> ValidationResult {
        self.validator.validate_elements(chain)
    }

    pub fn template_config(&self, config: &Value, env: &Env) -> Value {
        template_config(config, env)
    }

    /// Environment for running `chain`: `env_config`s are merged from the
    /// primitive up, so the link closest to the tool wins.
    pub fn resolve_env(&self, chain: &[ChainElement]) -> Env {
        let mut merged: Map<String, Value> = Map::new();
        for env_config in chain.iter().rev().filter_map(|e| e.env_config.as_ref()) {
            for (key, value) in env_config {
                match (merged.get_mut(key), value) {
                    (Some(Value::Object(existing)), Value::Object(update)) if key == "env" => {
                        existing.extend(update.clone());
                    }
                    _ => {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        let env_config = (!merged.is_empty()).then_some(&merged);
        self.env_resolver.resolve(env_config, None, true)
    }

    /// Build, validate, and template the chain for `item_id`, then run its
    /// terminal primitive with `params` layered over the merged config.
    pub fn execute(
        &self,
        item_id: &str,
        params: &Map<String, Value>,
        primitives: &PrimitiveRegistry,
    ) -> RyeResult<ExecutionResult> {
        let started = Instant::now();
        let chain = self.build_chain(item_id, false)?;
        let Some(terminal) = chain.last() else {
            return Ok(ExecutionResult::failure(format!("tool not found: {item_id}")));
        };
        let ids: Vec<String> = chain.iter().map(|e| e.item_id.clone()).collect();
        let finish = |mut result: ExecutionResult| {
            result.chain = ids.clone();
            result.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            result
        };

        let validation = self.validate_chain(&chain);
        if !validation.valid {
            return Ok(finish(ExecutionResult::failure(format!(
                "chain validation failed: {}",
                validation.issues.join("; ")
            ))));
        }

        let Some(primitive) = primitives.get(&terminal.item_id) else {
            return Ok(finish(ExecutionResult::failure(format!(
                "no primitive registered for {}",
                terminal.item_id
            ))));
        };

        let env = self.resolve_env(&chain);
        let mut config = Map::new();
        for element in chain.iter().rev() {
            config.extend(element.config.clone());
        }
        config.extend(params.clone());
        let templated = template_config(&Value::Object(config), &env);

        debug!(item_id, primitive = %terminal.item_id, "dispatching to primitive");
        Ok(finish(primitive.execute(&templated)))
    }

    pub fn clear_caches(&self) {
        self.chain_cache.clear();
        self.metadata_cache.clear();
    }

    pub fn get_cache_stats(&self) -> ExecutorCacheStats {
        ExecutorCacheStats {
            chain_cache_size: self.chain_cache.len(),
            metadata_cache_size: self.metadata_cache.len(),
            chain_cache_hits: self.chain_cache.stats().hits,
        }
    }

    fn resolve_manifest(&self, item_id: &str) -> Option<Resolved> {
        let mut skipped = Vec::new();
        for (path, space) in self.resolve_candidates(item_id) {
            match self.load_metadata(&path) {
                Some(manifest) => {
                    return Some(Resolved {
                        path,
                        space,
                        manifest,
                        skipped,
                    })
                }
                None => {
                    let fingerprint = Fingerprint::of(&path);
                    skipped.push((path, fingerprint));
                }
            }
        }
        None
    }

    /// A cached chain is reusable while every link's file is unchanged and
    /// no file has appeared that resolution would now prefer over the root.
    /// Only stats are needed; the tools trees are not walked.
    fn cached_chain(&self, item_id: &str) -> Option<Vec<ChainElement>> {
        let (root, space, skipped) = self.chain_cache.peek(item_id, |cached| {
            let root = cached.chain.first()?;
            Some((root.path.clone(), root.space, cached.skipped.clone()))
        })??;
        if self.root_shadowed(item_id, &root, space, &skipped) {
            self.chain_cache.invalidate(item_id);
            return None;
        }
        let cached = self.chain_cache.get(item_id, Fingerprint::of(&root).as_ref())?;
        let unchanged = cached
            .chain
            .iter()
            .zip(&cached.fingerprints)
            .all(|(e, fp)| fp.is_some() && Fingerprint::of(&e.path) == *fp);
        if !unchanged {
            self.chain_cache.invalidate(item_id);
            return None;
        }
        Some(cached.chain)
    }

    /// Whether an exact `<tools>/<item_id>.<ext>` file now precedes `root`:
    /// one in a higher-precedence space, or one with an earlier extension in
    /// the root's own space.  Files that failed to load when the chain was
    /// built do not count while their fingerprint holds.
    fn root_shadowed(
        &self,
        item_id: &str,
        root: &Path,
        root_space: Space,
        skipped: &[SeenFile],
    ) -> bool {
        for (dir, space) in self.config.type_dirs(ItemType::Tool) {
            for ext in TOOL_EXTENSIONS {
                let path = dir.join(format!("{item_id}.{ext}"));
                if path == root {
                    return false;
                }
                if !path.is_file() {
                    continue;
                }
                let still_unloadable = skipped
                    .iter()
                    .any(|(p, fp)| *p == path && fp.is_some() && Fingerprint::of(&path) == *fp);
                if !still_unloadable {
                    debug!(item_id, shadow = %path.display(), "cached chain root shadowed");
                    return true;
                }
            }
            if space == root_space {
                return false;
            }
        }
        false
    }
}

fn chain_element(
    item_id: String,
    space: Space,
    path: PathBuf,
    manifest: ToolManifest,
) -> ChainElement {
    let tool_type =
        ToolType::from_declared(manifest.tool_type.as_deref(), manifest.executor_id.is_some());
    ChainElement {
        item_id,
        space,
        tool_type,
        executor_id: manifest.executor_id,
        version: manifest.version,
        path,
        config: manifest.config,
        env_config: manifest.env_config,
        config_schema: manifest.config_schema,
        inputs: manifest.inputs,
        outputs: manifest.outputs,
        child_constraints: manifest.child_constraints,
    }
}

/// Tool files below `dir` whose relative path, minus extension, is
/// `item_id` or ends with `/<item_id>`.
fn walk_matches(dir: &Path, item_id: &str) -> Vec<PathBuf> {
    let suffix = format!("/{item_id}");
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();
            let ext = path.extension()?.to_str()?;
            if !TOOL_EXTENSIONS.contains(&ext) {
                return None;
            }
            let rel = path.strip_prefix(dir).ok()?.with_extension("");
            let rel: Vec<&str> = rel.iter().filter_map(|c| c.to_str()).collect();
            let rel = rel.join("/");
            (rel == item_id || rel.ends_with(&suffix)).then_some(path)
        })
        .collect()
}
