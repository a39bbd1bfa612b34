//! Environment resolution for tool execution.
//!
//! Layers, later overriding earlier:
//! 1. the process environment (or an injected base environment)
//! 2. `.env` files: `<user>/.env`, `<project>/.ai/.env`, `<project>/.env`,
//!    `<project>/.env.local`
//! 3. the interpreter variable from `env_config.interpreter`
//! 4. `env_config.env` static entries, each expanded against the env so far
//! 5. caller-supplied tool env, each expanded the same way

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::dotenv::load_dotenv;
use super::interpreter::{InterpreterLocator, InterpreterSpec};
use crate::config::{RyeConfig, PROJECT_SPACE_DIR};
use crate::extract::scalar_string;

static EXPAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap());

pub type Env = IndexMap<String, String>;

/// Expand `${VAR}` and `${VAR:-default}` against `env`.  Unset variables
/// without a default expand to the empty string.
pub fn expand_value(value: &str, env: &Env) -> String {
    EXPAND_RE
        .replace_all(value, |caps: &Captures<'_>| {
            let name = &caps[1];
            match env.get(name) {
                Some(v) => v.clone(),
                None => caps.get(2).map_or(String::new(), |d| d.as_str().to_string()),
            }
        })
        .into_owned()
}

pub struct EnvResolver {
    project_path: Option<PathBuf>,
    user_space: PathBuf,
    search_path: Option<OsString>,
    base_env: Option<Env>,
}

impl EnvResolver {
    pub fn new(project_path: Option<PathBuf>, user_space: impl Into<PathBuf>) -> Self {
        Self {
            project_path,
            user_space: user_space.into(),
            search_path: None,
            base_env: None,
        }
    }

    pub fn from_config(config: &RyeConfig) -> Self {
        Self::new(config.project_path.clone(), config.user_space.clone())
    }

    /// Use `path` instead of `$PATH` for binary lookups.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Start from `env` instead of the process environment.
    pub fn with_base_env(mut self, env: Env) -> Self {
        self.base_env = Some(env);
        self
    }

    pub fn resolve(
        &self,
        env_config: Option<&Map<String, Value>>,
        tool_env: Option<&Map<String, Value>>,
        include_dotenv: bool,
    ) -> Env {
        let mut env = match &self.base_env {
            Some(base) => base.clone(),
            None => std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        };

        if include_dotenv {
            env.extend(self.load_dotenv_files());
        }

        if let Some(Value::Object(interpreter)) = env_config.and_then(|c| c.get("interpreter")) {
            let spec = InterpreterSpec::from_config(interpreter);
            if let Some(path) = self.resolve_interpreter(&spec) {
                env.insert(spec.var, path);
            }
        }

        if let Some(Value::Object(static_env)) = env_config.and_then(|c| c.get("env")) {
            apply_expanded(&mut env, static_env);
        }

        if let Some(tool_env) = tool_env {
            apply_expanded(&mut env, tool_env);
        }

        env
    }

    pub fn resolve_interpreter(&self, spec: &InterpreterSpec) -> Option<String> {
        InterpreterLocator {
            project_path: self.project_path.as_deref(),
            user_space: &self.user_space,
            search_path: self.search_path.as_ref(),
        }
        .resolve(spec)
    }

    pub fn dotenv_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.user_space.join(".env")];
        if let Some(project) = &self.project_path {
            paths.push(project.join(PROJECT_SPACE_DIR).join(".env"));
            paths.push(project.join(".env"));
            paths.push(project.join(".env.local"));
        }
        paths
    }

    pub fn load_dotenv_files(&self) -> Env {
        let mut vars = Env::new();
        for path in self.dotenv_paths() {
            if !path.is_file() {
                continue;
            }
            match load_dotenv(&path) {
                Ok(loaded) => {
                    debug!(path = %path.display(), count = loaded.len(), "loaded .env file");
                    vars.extend(loaded);
                }
                Err(err) => warn!(path = %path.display(), error = %err, "failed to load .env file"),
            }
        }
        vars
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

fn apply_expanded(env: &mut Env, entries: &Map<String, Value>) {
    for (key, value) in entries {
        let Some(raw) = scalar_string(value) else {
            continue;
        };
        let expanded = expand_value(&raw, env);
        env.insert(key.clone(), expanded);
    }
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

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_expand_value() {
        let e = env(&[("HOME", "/home/u"), ("EMPTY", "")]);
        assert_eq!(expand_value("${HOME}/bin", &e), "/home/u/bin");
        assert_eq!(expand_value("${MISSING:-/tmp}", &e), "/tmp");
        assert_eq!(expand_value("${MISSING}", &e), "");
        assert_eq!(expand_value("${EMPTY:-x}", &e), "");
        assert_eq!(expand_value("${HOME:-x}-${HOME}", &e), "/home/u-/home/u");
        assert_eq!(expand_value("no vars $HOME", &e), "no vars $HOME");
    }

    #[test]
    fn test_layer_order_and_expansion_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        let user = tmp.path().join("user");
        std::fs::create_dir_all(project.join(".ai")).unwrap();
        std::fs::create_dir_all(&user).unwrap();
        std::fs::write(user.join(".env"), "LEVEL=user\nUSER_ONLY=1\n").unwrap();
        std::fs::write(project.join(".ai/.env"), "LEVEL=ai\n").unwrap();
        std::fs::write(project.join(".env"), "LEVEL=project\n").unwrap();
        std::fs::write(project.join(".env.local"), "LEVEL=local\n").unwrap();

        let resolver = EnvResolver::new(Some(project), &user)
            .with_base_env(env(&[("LEVEL", "process"), ("BASE", "/opt")]))
            .with_search_path("");
        let env_config = object(json!({
            "interpreter": {"type": "system_binary", "binary": "nope", "var": "RUNNER", "fallback": "sh"},
            "env": {"APP_HOME": "${BASE}/app", "APP_BIN": "${APP_HOME}/bin", "PORT": 8080},
        }));
        let tool_env = object(json!({"LOG": "${APP_BIN}/log", "LEVEL": "${LEVEL}-tool"}));

        let resolved = resolver.resolve(Some(&env_config), Some(&tool_env), true);
        assert_eq!(resolved["USER_ONLY"], "1");
        assert_eq!(resolved["RUNNER"], "sh");
        assert_eq!(resolved["APP_HOME"], "/opt/app");
        assert_eq!(resolved["APP_BIN"], "/opt/app/bin");
        assert_eq!(resolved["PORT"], "8080");
        assert_eq!(resolved["LOG"], "/opt/app/bin/log");
        assert_eq!(resolved["LEVEL"], "local-tool");
    }

    #[test]
    fn test_dotenv_can_be_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".env"), "FROM_FILE=1\n").unwrap();
        let resolver = EnvResolver::new(None, tmp.path()).with_base_env(Env::new());
        assert!(!resolver.resolve(None, None, false).contains_key("FROM_FILE"));
        assert!(resolver.resolve(None, None, true).contains_key("FROM_FILE"));
    }

    #[test]
    fn test_unresolved_interpreter_without_fallback_is_unset() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(None, tmp.path())
            .with_base_env(Env::new())
            .with_search_path("");
        let env_config = object(json!({"interpreter": {"type": "system_binary", "binary": "nope"}}));
        let resolved = resolver.resolve(Some(&env_config), None, false);
        assert!(!resolved.contains_key("INTERPRETER"));
    }

    #[test]
    fn test_process_env_is_default_base() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(None, tmp.path());
        let resolved = resolver.resolve(None, None, false);
        if let Ok(path) = std::env::var("PATH") {
            assert_eq!(resolved.get("PATH"), Some(&path));
        }
    }
}
