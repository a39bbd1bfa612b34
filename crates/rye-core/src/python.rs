//! PyO3 bindings exposing the core to the Python tool host.
//!
//! Structured values cross the boundary as plain Python containers; they are
//! converted through the `json` module so the Rust side only ever sees
//! `serde_json::Value`.

use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::wrap_pyfunction;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::chain::{ChainLink, ChainValidator, LockfileResolver, PrimitiveExecutor};
use crate::config::{RyeConfig, MAX_CHAIN_DEPTH, MAX_QUERY_LENGTH, MAX_SEARCH_LIMIT};
use crate::env::{expand_value, Env};
use crate::errors::RyeError;
use crate::integrity::{self, IntegrityVerifier};
use crate::models::{ItemType, Space};
use crate::query::{levenshtein_distance, SearchEngine, SearchOptions};
use crate::version;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn to_value(py: Python<'_>, obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    let text: String = py.import("json")?.call_method1("dumps", (obj,))?.extract()?;
    Ok(serde_json::from_str(&text).map_err(RyeError::from)?)
}

fn to_py<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let text = serde_json::to_string(value).map_err(RyeError::from)?;
    Ok(py.import("json")?.call_method1("loads", (text,))?.unbind())
}

fn to_object(py: Python<'_>, obj: Option<&Bound<'_, PyAny>>) -> PyResult<Map<String, Value>> {
    match obj.map(|o| to_value(py, o)).transpose()? {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(RyeError::InvalidInput("expected a mapping".to_string()).into()),
    }
}

fn to_env(py: Python<'_>, obj: Option<&Bound<'_, PyAny>>) -> PyResult<Env> {
    Ok(to_object(py, obj)?
        .into_iter()
        .filter_map(|(k, v)| crate::extract::scalar_string(&v).map(|s| (k, s)))
        .collect())
}

fn build_config(
    project_path: Option<PathBuf>,
    user_space: Option<PathBuf>,
    system_space: Option<PathBuf>,
) -> RyeConfig {
    let mut config = RyeConfig::from_env(project_path);
    if let Some(user_space) = user_space {
        config.user_space = user_space;
    }
    if let Some(system_space) = system_space {
        config.system_space = system_space;
    }
    config
}

fn parse_item_type(item_type: &str) -> PyResult<ItemType> {
    Ok(item_type.parse::<ItemType>()?)
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

#[pyclass(name = "PrimitiveExecutor")]
pub struct PyPrimitiveExecutor {
    inner: PrimitiveExecutor,
}

#[pymethods]
impl PyPrimitiveExecutor {
    #[new]
    #[pyo3(signature = (project_path=None, user_space=None, system_space=None))]
    fn new(
        project_path: Option<PathBuf>,
        user_space: Option<PathBuf>,
        system_space: Option<PathBuf>,
    ) -> Self {
        Self {
            inner: PrimitiveExecutor::new(build_config(project_path, user_space, system_space)),
        }
    }

    #[pyo3(signature = (item_id, force_refresh=false))]
    fn build_chain(
        &self,
        py: Python<'_>,
        item_id: &str,
        force_refresh: bool,
    ) -> PyResult<PyObject> {
        let chain = py.allow_threads(|| self.inner.build_chain(item_id, force_refresh))?;
        to_py(py, &chain)
    }

    fn resolve_tool_path(&self, item_id: &str) -> Option<(PathBuf, String)> {
        self.inner
            .resolve_tool_path(item_id)
            .map(|(path, space)| (path, space.to_string()))
    }

    #[pyo3(signature = (config, env=None))]
    fn template_config(
        &self,
        py: Python<'_>,
        config: &Bound<'_, PyAny>,
        env: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<PyObject> {
        let config = to_value(py, config)?;
        let env = to_env(py, env)?;
        to_py(py, &self.inner.template_config(&config, &env))
    }

    #[pyo3(signature = (item_id, force_refresh=false))]
    fn validate(&self, py: Python<'_>, item_id: &str, force_refresh: bool) -> PyResult<PyObject> {
        let chain = self.inner.build_chain(item_id, force_refresh)?;
        to_py(py, &self.inner.validate_chain(&chain))
    }

    fn resolve_env(&self, py: Python<'_>, item_id: &str) -> PyResult<PyObject> {
        let chain = self.inner.build_chain(item_id, false)?;
        to_py(py, &self.inner.resolve_env(&chain))
    }

    fn clear_caches(&self) {
        self.inner.clear_caches();
    }

    fn get_cache_stats(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, &self.inner.get_cache_stats())
    }
}

#[pyclass(name = "ChainValidator")]
pub struct PyChainValidator {
    inner: ChainValidator,
}

#[pymethods]
impl PyChainValidator {
    #[new]
    fn new() -> Self {
        Self {
            inner: ChainValidator::new(),
        }
    }

    fn validate_chain(&self, py: Python<'_>, chain: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let links: Vec<ChainLink> =
            serde_json::from_value(to_value(py, chain)?).map_err(RyeError::from)?;
        to_py(py, &self.inner.validate_chain(&links))
    }
}

#[pyclass(name = "IntegrityVerifier")]
pub struct PyIntegrityVerifier {
    inner: IntegrityVerifier,
}

#[pymethods]
impl PyIntegrityVerifier {
    #[new]
    fn new() -> Self {
        Self {
            inner: IntegrityVerifier::from_config(&RyeConfig::from_env(None)),
        }
    }

    #[pyo3(signature = (path, item_type, expected_hash=None))]
    fn verify(
        &self,
        py: Python<'_>,
        path: PathBuf,
        item_type: &str,
        expected_hash: Option<&str>,
    ) -> PyResult<PyObject> {
        let item_type = parse_item_type(item_type)?;
        let result = py.allow_threads(|| self.inner.verify(&path, item_type, expected_hash));
        to_py(py, &result)
    }

    fn compute_hash(&self, path: PathBuf, item_type: &str) -> PyResult<String> {
        Ok(self.inner.compute_hash(&path, parse_item_type(item_type)?)?)
    }

    fn invalidate(&self, path: PathBuf) -> bool {
        self.inner.invalidate(&path)
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn stats(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, &self.inner.stats())
    }
}

#[pyclass(name = "SearchEngine")]
pub struct PySearchEngine {
    inner: SearchEngine,
}

#[pymethods]
impl PySearchEngine {
    #[new]
    #[pyo3(signature = (project_path=None, user_space=None, system_space=None))]
    fn new(
        project_path: Option<PathBuf>,
        user_space: Option<PathBuf>,
        system_space: Option<PathBuf>,
    ) -> Self {
        Self {
            inner: SearchEngine::new(build_config(project_path, user_space, system_space)),
        }
    }

    /// `options` is a mapping with the `SearchOptions` fields.
    fn search(&self, py: Python<'_>, options: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let options: SearchOptions =
            serde_json::from_value(to_value(py, options)?).map_err(RyeError::from)?;
        let response = py.allow_threads(|| self.inner.search(&options));
        to_py(py, &response)
    }

    fn clear_cache(&self) {
        self.inner.clear_cache();
    }
}

#[pyclass(name = "LockfileResolver")]
pub struct PyLockfileResolver {
    inner: LockfileResolver,
}

#[pymethods]
impl PyLockfileResolver {
    #[new]
    #[pyo3(signature = (project_path, user_space, system_space, scope="project"))]
    fn new(
        project_path: Option<PathBuf>,
        user_space: PathBuf,
        system_space: PathBuf,
        scope: &str,
    ) -> PyResult<Self> {
        let scope: Space = scope.parse()?;
        Ok(Self {
            inner: LockfileResolver::new(project_path, user_space, system_space).with_scope(scope),
        })
    }

    #[setter]
    fn set_scope(&mut self, scope: &str) -> PyResult<()> {
        self.inner.set_scope(scope.parse()?);
        Ok(())
    }

    #[getter]
    fn scope(&self) -> String {
        self.inner.scope().to_string()
    }

    /// Create and save a lockfile, returning the path written.
    fn save(
        &self,
        py: Python<'_>,
        tool_id: &str,
        version: &str,
        integrity: &str,
        resolved_chain: &Bound<'_, PyAny>,
    ) -> PyResult<PathBuf> {
        let chain = match to_value(py, resolved_chain)? {
            Value::Array(items) => items,
            _ => {
                return Err(RyeError::InvalidInput("resolved_chain must be a list".into()).into())
            }
        };
        let lockfile = self.inner.create_lockfile(tool_id, version, integrity, chain);
        Ok(self.inner.save_lockfile(&lockfile)?)
    }

    fn get_lockfile(&self, py: Python<'_>, tool_id: &str, version: &str) -> PyResult<PyObject> {
        to_py(py, &self.inner.get_lockfile(tool_id, version))
    }

    fn exists(&self, tool_id: &str, version: &str) -> bool {
        self.inner.exists(tool_id, version)
    }

    fn list_lockfiles(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, &self.inner.list_lockfiles())
    }

    fn delete_lockfile(&self, tool_id: &str, version: &str) -> PyResult<bool> {
        Ok(self.inner.delete_lockfile(tool_id, version)?)
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// -1, 0 or 1 as `a` orders before, equal to or after `b`.
#[pyfunction]
fn compare_version(a: &str, b: &str) -> i32 {
    version::compare_version(a, b) as i32
}

#[pyfunction]
fn version_satisfies(version: &str, op: &str, constraint: &str) -> bool {
    version::version_satisfies(version, op, constraint)
}

#[pyfunction]
#[pyo3(name = "levenshtein_distance")]
fn py_levenshtein_distance(a: &str, b: &str) -> usize {
    levenshtein_distance(a, b)
}

#[pyfunction]
#[pyo3(signature = (value, env=None))]
fn expand_env_value(
    py: Python<'_>,
    value: &str,
    env: Option<&Bound<'_, PyAny>>,
) -> PyResult<String> {
    Ok(expand_value(value, &to_env(py, env)?))
}

#[pyfunction]
#[pyo3(signature = (tool_id, version, manifest, files=None))]
fn compute_tool_integrity(
    py: Python<'_>,
    tool_id: &str,
    version: &str,
    manifest: &Bound<'_, PyAny>,
    files: Option<&Bound<'_, PyAny>>,
) -> PyResult<String> {
    let manifest = to_value(py, manifest)?;
    let files = match files.map(|f| to_value(py, f)).transpose()? {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    };
    Ok(integrity::compute_tool_integrity(
        tool_id,
        version,
        &manifest,
        files.as_deref(),
    ))
}

#[pyfunction]
#[pyo3(signature = (name, version, xml_content, metadata=None))]
fn compute_directive_integrity(
    py: Python<'_>,
    name: &str,
    version: &str,
    xml_content: &str,
    metadata: Option<&Bound<'_, PyAny>>,
) -> PyResult<String> {
    let metadata = metadata.map(|m| to_value(py, m)).transpose()?;
    Ok(integrity::compute_directive_integrity(
        name,
        version,
        xml_content,
        metadata.as_ref(),
    ))
}

#[pyfunction]
#[pyo3(signature = (id, version, content, metadata=None))]
fn compute_knowledge_integrity(
    py: Python<'_>,
    id: &str,
    version: &str,
    content: &str,
    metadata: Option<&Bound<'_, PyAny>>,
) -> PyResult<String> {
    let metadata = metadata.map(|m| to_value(py, m)).transpose()?;
    Ok(integrity::compute_knowledge_integrity(
        id,
        version,
        content,
        metadata.as_ref(),
    ))
}

// ---------------------------------------------------------------------------
// Top-level Python module: _rye_core
// ---------------------------------------------------------------------------

#[pymodule]
fn _rye_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("MAX_CHAIN_DEPTH", MAX_CHAIN_DEPTH)?;
    m.add("MAX_QUERY_LENGTH", MAX_QUERY_LENGTH)?;
    m.add("MAX_SEARCH_LIMIT", MAX_SEARCH_LIMIT)?;

    m.add_class::<PyPrimitiveExecutor>()?;
    m.add_class::<PyChainValidator>()?;
    m.add_class::<PyIntegrityVerifier>()?;
    m.add_class::<PySearchEngine>()?;
    m.add_class::<PyLockfileResolver>()?;

    m.add_function(wrap_pyfunction!(compare_version, m)?)?;
    m.add_function(wrap_pyfunction!(version_satisfies, m)?)?;
    m.add_function(wrap_pyfunction!(py_levenshtein_distance, m)?)?;
    m.add_function(wrap_pyfunction!(expand_env_value, m)?)?;
    m.add_function(wrap_pyfunction!(compute_tool_integrity, m)?)?;
    m.add_function(wrap_pyfunction!(compute_directive_integrity, m)?)?;
    m.add_function(wrap_pyfunction!(compute_knowledge_integrity, m)?)?;
    Ok(())
}
