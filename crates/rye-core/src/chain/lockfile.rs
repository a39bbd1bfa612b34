//! Lockfiles pinning a tool's resolved chain and integrity.
//!
//! Each space keeps its lockfiles under `<root>/lockfiles` as
//! `<tool_id>@<version>.lock.json`, with `/` in tool ids encoded as `__`.
//! Reads follow project > user > system precedence; writes and deletes only
//! touch the writable spaces.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RyeConfig;
use crate::errors::{RyeError, RyeResult};
use crate::models::Space;

pub const LOCKFILE_VERSION: u32 = 1;
const LOCKFILE_DIR: &str = "lockfiles";
const LOCKFILE_SUFFIX: &str = ".lock.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockfileRoot {
    pub tool_id: String,
    pub version: String,
    pub integrity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    pub lockfile_version: u32,
    pub generated_at: String,
    pub root: LockfileRoot,
    #[serde(default)]
    pub resolved_chain: Vec<Value>,
}

/// A lockfile found on disk, as reported by [`LockfileResolver::list_lockfiles`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockfileEntry {
    pub tool_id: String,
    pub version: String,
    pub space: Space,
    pub path: PathBuf,
}

pub struct LockfileResolver {
    project_root: Option<PathBuf>,
    user_space: PathBuf,
    system_space: PathBuf,
    scope: Space,
}

impl LockfileResolver {
    /// `project_root` is the directory that holds the project's `lockfiles`
    /// directory (normally `<project>/.ai`).
    pub fn new(
        project_root: Option<PathBuf>,
        user_space: impl Into<PathBuf>,
        system_space: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_root,
            user_space: user_space.into(),
            system_space: system_space.into(),
            scope: Space::Project,
        }
    }

    pub fn from_config(config: &RyeConfig) -> Self {
        Self::new(
            config.space_root(Space::Project),
            config.user_space.clone(),
            config.system_space.clone(),
        )
    }

    pub fn scope(&self) -> Space {
        self.scope
    }

    /// Select the space new lockfiles are saved into.
    pub fn set_scope(&mut self, scope: Space) {
        self.scope = scope;
    }

    pub fn with_scope(mut self, scope: Space) -> Self {
        self.scope = scope;
        self
    }

    pub fn create_lockfile(
        &self,
        tool_id: &str,
        version: &str,
        integrity: &str,
        resolved_chain: Vec<Value>,
    ) -> Lockfile {
        Lockfile {
            lockfile_version: LOCKFILE_VERSION,
            generated_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            root: LockfileRoot {
                tool_id: tool_id.to_string(),
                version: version.to_string(),
                integrity: integrity.to_string(),
            },
            resolved_chain,
        }
    }

    /// Write `lockfile` into the current scope and return its path.
    pub fn save_lockfile(&self, lockfile: &Lockfile) -> RyeResult<PathBuf> {
        let dir = self.writable_dir(self.scope)?;
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name(&lockfile.root.tool_id, &lockfile.root.version));
        fs::write(&path, serde_json::to_string_pretty(lockfile)?)?;
        info!(
            tool_id = %lockfile.root.tool_id,
            version = %lockfile.root.version,
            space = %self.scope,
            "lockfile saved"
        );
        Ok(path)
    }

    /// Highest-precedence lockfile for `(tool_id, version)`.  Unreadable
    /// files are skipped.
    pub fn get_lockfile(&self, tool_id: &str, version: &str) -> Option<Lockfile> {
        let name = file_name(tool_id, version);
        self.lockfile_dirs().into_iter().find_map(|(dir, space)| {
            let path = dir.join(&name);
            if !path.is_file() {
                return None;
            }
            match read_lockfile(&path) {
                Ok(lockfile) => {
                    debug!(tool_id, version, %space, "lockfile resolved");
                    Some(lockfile)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable lockfile skipped");
                    None
                }
            }
        })
    }

    pub fn exists(&self, tool_id: &str, version: &str) -> bool {
        let name = file_name(tool_id, version);
        self.lockfile_dirs()
            .iter()
            .any(|(dir, _)| dir.join(&name).is_file())
    }

    /// All lockfiles across spaces; a `(tool_id, version)` present in
    /// several spaces is reported once, from the highest-precedence one.
    pub fn list_lockfiles(&self) -> Vec<LockfileEntry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for (dir, space) in self.lockfile_dirs() {
            let Ok(read_dir) = fs::read_dir(&dir) else {
                continue;
            };
            let mut names: Vec<String> = read_dir
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect();
            names.sort();

            for name in names {
                let Some((tool_id, version)) = parse_file_name(&name) else {
                    continue;
                };
                if seen.insert((tool_id.clone(), version.clone())) {
                    entries.push(LockfileEntry {
                        tool_id,
                        version,
                        space,
                        path: dir.join(&name),
                    });
                }
            }
        }
        entries
    }

    /// Remove the lockfile from every writable space that has it.  Returns
    /// whether anything was deleted.
    pub fn delete_lockfile(&self, tool_id: &str, version: &str) -> RyeResult<bool> {
        let name = file_name(tool_id, version);
        let mut deleted = false;
        for (dir, space) in self.lockfile_dirs() {
            if !space.is_writable() {
                continue;
            }
            let path = dir.join(&name);
            if path.is_file() {
                fs::remove_file(&path)?;
                info!(tool_id, version, %space, "lockfile deleted");
                deleted = true;
            }
        }
        Ok(deleted)
    }

    fn space_dir(&self, space: Space) -> Option<PathBuf> {
        let root = match space {
            Space::Project => self.project_root.clone()?,
            Space::User => self.user_space.clone(),
            Space::System => self.system_space.clone(),
        };
        Some(root.join(LOCKFILE_DIR))
    }

    fn writable_dir(&self, space: Space) -> RyeResult<PathBuf> {
        if !space.is_writable() {
            return Err(RyeError::Lockfile(format!(
                "cannot write lockfiles to the {space} space"
            )));
        }
        self.space_dir(space).ok_or_else(|| {
            RyeError::Lockfile(format!("no {space} space configured for lockfiles"))
        })
    }

    fn lockfile_dirs(&self) -> Vec<(PathBuf, Space)> {
        Space::ALL
            .iter()
            .filter_map(|&space| self.space_dir(space).map(|dir| (dir, space)))
            .collect()
    }
}

fn read_lockfile(path: &Path) -> RyeResult<Lockfile> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn file_name(tool_id: &str, version: &str) -> String {
    format!("{}@{}{}", tool_id.replace('/', "__"), version, LOCKFILE_SUFFIX)
}

fn parse_file_name(name: &str) -> Option<(String, String)> {
    let stem = name.strip_suffix(LOCKFILE_SUFFIX)?;
    let (tool_id, version) = stem.rsplit_once('@')?;
    if tool_id.is_empty() || version.is_empty() {
        return None;
    }
    Some((tool_id.replace("__", "/"), version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LockfileResolver) {
        let tmp = TempDir::new().unwrap();
        for space in ["project", "user", "system"] {
            fs::create_dir_all(tmp.path().join(space).join(LOCKFILE_DIR)).unwrap();
        }
        let resolver = LockfileResolver::new(
            Some(tmp.path().join("project")),
            tmp.path().join("user"),
            tmp.path().join("system"),
        );
        (tmp, resolver)
    }

    fn write_system(tmp: &TempDir, tool_id: &str, integrity: &str) {
        let body = json!({
            "lockfile_version": 1,
            "generated_at": "2026-01-01T00:00:00Z",
            "root": {"tool_id": tool_id, "version": "1.0.0", "integrity": integrity},
            "resolved_chain": [{"from": "system"}],
        });
        fs::write(
            tmp.path()
                .join("system/lockfiles")
                .join(format!("{tool_id}@1.0.0.lock.json")),
            body.to_string(),
        )
        .unwrap();
    }

    #[test]
    fn test_save_and_load() {
        let (_tmp, resolver) = setup();
        let lockfile = resolver.create_lockfile(
            "test_tool",
            "1.0.0",
            "sha256:abc123",
            vec![json!({"tool_id": "test_tool", "space": "project"})],
        );
        assert_eq!(lockfile.lockfile_version, LOCKFILE_VERSION);
        assert!(lockfile.generated_at.ends_with('Z'));

        let path = resolver.save_lockfile(&lockfile).unwrap();
        assert!(path.exists());
        assert!(path.ends_with("project/lockfiles/test_tool@1.0.0.lock.json"));

        let loaded = resolver.get_lockfile("test_tool", "1.0.0").unwrap();
        assert_eq!(loaded, lockfile);
    }

    #[test]
    fn test_project_over_user() {
        let (_tmp, mut resolver) = setup();
        resolver.set_scope(Space::User);
        let user = resolver.create_lockfile("shared_tool", "1.0.0", "sha256:user", vec![]);
        resolver.save_lockfile(&user).unwrap();

        resolver.set_scope(Space::Project);
        let project = resolver.create_lockfile("shared_tool", "1.0.0", "sha256:project", vec![]);
        resolver.save_lockfile(&project).unwrap();

        let loaded = resolver.get_lockfile("shared_tool", "1.0.0").unwrap();
        assert_eq!(loaded.root.integrity, "sha256:project");
    }

    #[test]
    fn test_user_over_system_and_fallback() {
        let (tmp, resolver) = setup();
        write_system(&tmp, "sys_tool", "sha256:system");
        write_system(&tmp, "bundled", "sha256:bundled");

        let resolver = resolver.with_scope(Space::User);
        let user = resolver.create_lockfile("sys_tool", "1.0.0", "sha256:user", vec![]);
        resolver.save_lockfile(&user).unwrap();

        let loaded = resolver.get_lockfile("sys_tool", "1.0.0").unwrap();
        assert_eq!(loaded.root.integrity, "sha256:user");
        let loaded = resolver.get_lockfile("bundled", "1.0.0").unwrap();
        assert_eq!(loaded.root.integrity, "sha256:bundled");
        assert_eq!(loaded.resolved_chain, vec![json!({"from": "system"})]);
    }

    #[test]
    fn test_not_found_and_corrupt() {
        let (tmp, resolver) = setup();
        assert!(resolver.get_lockfile("nonexistent", "1.0.0").is_none());

        fs::write(tmp.path().join("project/lockfiles/bad@1.0.0.lock.json"), "{").unwrap();
        write_system(&tmp, "bad", "sha256:system");
        let loaded = resolver.get_lockfile("bad", "1.0.0").unwrap();
        assert_eq!(loaded.root.integrity, "sha256:system");
    }

    #[test]
    fn test_system_scope_is_read_only() {
        let (_tmp, resolver) = setup();
        let resolver = resolver.with_scope(Space::System);
        let lockfile = resolver.create_lockfile("t", "1.0.0", "sha256:x", vec![]);
        assert!(matches!(
            resolver.save_lockfile(&lockfile),
            Err(RyeError::Lockfile(_))
        ));
    }

    #[test]
    fn test_list_lockfiles_deduplicates() {
        let (tmp, mut resolver) = setup();
        resolver.set_scope(Space::User);
        resolver
            .save_lockfile(&resolver.create_lockfile("user_tool", "1.0.0", "sha256:u", vec![]))
            .unwrap();
        resolver.set_scope(Space::Project);
        resolver
            .save_lockfile(&resolver.create_lockfile("project_tool", "2.0.0", "sha256:p", vec![]))
            .unwrap();
        assert_eq!(resolver.list_lockfiles().len(), 2);

        write_system(&tmp, "user_tool", "sha256:s");
        let entries = resolver.list_lockfiles();
        assert_eq!(entries.len(), 2);
        let user_tool = entries.iter().find(|e| e.tool_id == "user_tool").unwrap();
        assert_eq!(user_tool.space, Space::User);
        assert!(entries.iter().any(|e| e.tool_id == "project_tool" && e.version == "2.0.0"));
    }

    #[test]
    fn test_nested_tool_ids_are_encoded() {
        let (_tmp, resolver) = setup();
        let lockfile = resolver.create_lockfile("rye/core/thing", "0.1.0", "sha256:n", vec![]);
        let path = resolver.save_lockfile(&lockfile).unwrap();
        assert!(path.ends_with("rye__core__thing@0.1.0.lock.json"));
        assert!(resolver.exists("rye/core/thing", "0.1.0"));
        assert_eq!(resolver.list_lockfiles()[0].tool_id, "rye/core/thing");
    }

    #[test]
    fn test_delete_lockfile() {
        let (tmp, resolver) = setup();
        resolver
            .save_lockfile(&resolver.create_lockfile("deleteme", "1.0.0", "sha256:d", vec![]))
            .unwrap();
        assert!(resolver.exists("deleteme", "1.0.0"));
        assert!(resolver.delete_lockfile("deleteme", "1.0.0").unwrap());
        assert!(!resolver.exists("deleteme", "1.0.0"));
        assert!(!resolver.delete_lockfile("deleteme", "1.0.0").unwrap());

        write_system(&tmp, "bundled", "sha256:b");
        assert!(!resolver.delete_lockfile("bundled", "1.0.0").unwrap());
        assert!(resolver.exists("bundled", "1.0.0"));
    }

    #[test]
    fn test_from_config_uses_project_space_dir() {
        let tmp = TempDir::new().unwrap();
        let config = RyeConfig::new(
            Some(tmp.path().to_path_buf()),
            tmp.path().join("user"),
            tmp.path().join("system"),
        );
        let resolver = LockfileResolver::from_config(&config);
        let path = resolver
            .save_lockfile(&resolver.create_lockfile("t", "1.0.0", "sha256:x", vec![]))
            .unwrap();
        assert!(path.starts_with(tmp.path().join(".ai").join("lockfiles")));
    }
}
