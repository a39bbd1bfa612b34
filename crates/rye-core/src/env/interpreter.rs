//! Interpreter resolution strategies.
//!
//! An `interpreter` block in a runtime's env config names a strategy under
//! `type` and the environment variable to set under `var` (default
//! `INTERPRETER`).  Strategies search candidate locations in order and fall
//! back to the block's `fallback` when nothing is found.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::extract::scalar_string;
use crate::models::string_list;

pub const DEFAULT_INTERPRETER_VAR: &str = "INTERPRETER";

const DEFAULT_SEARCH: &[&str] = &["project", "rye", "user", "system"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterStrategy {
    VenvPython { search: Vec<String> },
    NodeModules { search: Vec<String> },
    SystemBinary { binary: Option<String> },
    VersionManager {
        manager: Option<String>,
        version: Option<String>,
        plugin: Option<String>,
        root: Option<String>,
        binary: Option<String>,
    },
}

/// Parsed `interpreter` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterSpec {
    pub var: String,
    pub fallback: Option<String>,
    /// `None` when `type` is missing or unknown.
    pub strategy: Option<InterpreterStrategy>,
}

impl InterpreterSpec {
    pub fn from_config(config: &Map<String, Value>) -> Self {
        let text = |key: &str| config.get(key).and_then(scalar_string).filter(|s| !s.is_empty());
        let search = || {
            config
                .get("search")
                .and_then(string_list)
                .unwrap_or_else(|| DEFAULT_SEARCH.iter().map(|s| s.to_string()).collect())
        };

        let strategy = match text("type").as_deref() {
            Some("venv_python") => Some(InterpreterStrategy::VenvPython { search: search() }),
            Some("node_modules") => Some(InterpreterStrategy::NodeModules { search: search() }),
            Some("system_binary") => Some(InterpreterStrategy::SystemBinary {
                binary: text("binary"),
            }),
            Some("version_manager") => Some(InterpreterStrategy::VersionManager {
                manager: text("manager"),
                version: text("version"),
                plugin: text("plugin"),
                root: text("root"),
                binary: text("binary"),
            }),
            Some(other) => {
                warn!(resolver_type = other, "unknown interpreter resolver type");
                None
            }
            None => {
                warn!("interpreter config has no resolver type");
                None
            }
        };

        Self {
            var: text("var").unwrap_or_else(|| DEFAULT_INTERPRETER_VAR.to_string()),
            fallback: text("fallback"),
            strategy,
        }
    }
}

/// Filesystem context the strategies search in.
pub struct InterpreterLocator<'a> {
    pub project_path: Option<&'a Path>,
    pub user_space: &'a Path,
    pub search_path: Option<&'a OsString>,
}

impl InterpreterLocator<'_> {
    /// Resolve the spec to a path, falling back to `spec.fallback`.
    pub fn resolve(&self, spec: &InterpreterSpec) -> Option<String> {
        let found = spec.strategy.as_ref().and_then(|strategy| self.locate(strategy));
        match found {
            Some(path) => {
                debug!(var = %spec.var, path = %path.display(), "resolved interpreter");
                Some(path.to_string_lossy().into_owned())
            }
            None => {
                if let Some(fallback) = &spec.fallback {
                    debug!(var = %spec.var, fallback = %fallback, "interpreter not found, using fallback");
                }
                spec.fallback.clone()
            }
        }
    }

    fn locate(&self, strategy: &InterpreterStrategy) -> Option<PathBuf> {
        match strategy {
            InterpreterStrategy::VenvPython { search } => {
                let (bin_dir, exe) = if cfg!(windows) {
                    ("Scripts", "python.exe")
                } else {
                    ("bin", "python")
                };
                let tail = Path::new(".venv").join(bin_dir).join(exe);
                self.search_locations(search, &tail, &["python3", "python"])
            }
            InterpreterStrategy::NodeModules { search } => {
                let exe = if cfg!(windows) { "node.exe" } else { "node" };
                let tail = Path::new("node_modules").join(".bin").join(exe);
                self.search_locations(search, &tail, &["node"])
            }
            InterpreterStrategy::SystemBinary { binary } => match binary {
                Some(binary) => self.which(binary),
                None => {
                    warn!("system_binary resolver has no binary");
                    None
                }
            },
            InterpreterStrategy::VersionManager {
                manager,
                version,
                plugin,
                root,
                binary,
            } => self.version_manager(
                manager.as_deref(),
                version.as_deref(),
                plugin.as_deref(),
                root.as_deref(),
                binary.as_deref(),
            ),
        }
    }

    /// Walk `search` keys: `project`, `rye` (tool-managed under
    /// `<project>/.ai/scripts`), `user`, and `system` (PATH lookup).
    fn search_locations(&self, search: &[String], tail: &Path, system: &[&str]) -> Option<PathBuf> {
        for key in search {
            let candidate = match key.as_str() {
                "project" => self.project_path.map(|p| p.join(tail)),
                "rye" => self.project_path.map(|p| p.join(".ai").join("scripts").join(tail)),
                "user" => Some(self.user_space.join(tail)),
                "system" => {
                    if let Some(found) = system.iter().find_map(|bin| self.which(bin)) {
                        return Some(found);
                    }
                    continue;
                }
                other => {
                    debug!(location = other, "unknown interpreter search location");
                    continue;
                }
            };
            if let Some(path) = candidate.filter(|p| p.is_file()) {
                return Some(path);
            }
        }
        None
    }

    fn version_manager(
        &self,
        manager: Option<&str>,
        version: Option<&str>,
        plugin: Option<&str>,
        root: Option<&str>,
        binary: Option<&str>,
    ) -> Option<PathBuf> {
        let home = dirs::home_dir().unwrap_or_default();
        let root_from = |var: &str, default: &str| {
            root.map(PathBuf::from)
                .or_else(|| std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from))
                .unwrap_or_else(|| home.join(default))
        };

        let (install, system_binary) = match manager {
            Some("rbenv") => {
                let root = root_from("RBENV_ROOT", ".rbenv");
                let bin = binary.unwrap_or("ruby");
                (version.map(|v| root.join("versions").join(v).join("bin").join(bin)), bin)
            }
            Some("nvm") => {
                let root = root_from("NVM_DIR", ".nvm");
                let bin = binary.unwrap_or("node");
                (
                    version.map(|v| root.join("versions").join("node").join(v).join("bin").join(bin)),
                    bin,
                )
            }
            Some("asdf") => {
                let Some(plugin) = plugin else {
                    warn!("asdf resolver has no plugin");
                    return None;
                };
                let root = root_from("ASDF_DATA_DIR", ".asdf");
                let bin = binary.unwrap_or(plugin);
                (
                    version.map(|v| root.join("installs").join(plugin).join(v).join("bin").join(bin)),
                    bin,
                )
            }
            Some(other) => {
                let (Some(root), Some(bin)) = (root, binary) else {
                    warn!(manager = other, "unknown version manager");
                    return None;
                };
                (
                    version.map(|v| Path::new(root).join("versions").join(v).join("bin").join(bin)),
                    bin,
                )
            }
            None => {
                warn!("version_manager resolver has no manager");
                return None;
            }
        };

        install
            .filter(|p| p.is_file())
            .or_else(|| self.which(system_binary))
    }

    /// PATH lookup, honouring an explicit search path when one is set.
    pub fn which(&self, binary: &str) -> Option<PathBuf> {
        let path_var = match self.search_path {
            Some(p) => p.clone(),
            None => std::env::var_os("PATH")?,
        };
        std::env::split_paths(&path_var).find_map(|dir| {
            let candidate = dir.join(binary);
            if is_executable(&candidate) {
                return Some(candidate);
            }
            if cfg!(windows) {
                let exe = dir.join(format!("{binary}.exe"));
                if is_executable(&exe) {
                    return Some(exe);
                }
            }
            None
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
