//! Runtime configuration and shared guardrails.
//!
//! `RyeConfig` carries the three space roots plus cache tuning.  It is built
//! explicitly (so tests can point it at temporary directories) or read from
//! the process environment with [`RyeConfig::from_env`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{ItemType, Space};

// Chain guards
pub const MAX_CHAIN_DEPTH: usize = 10;

// Cache defaults
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1000;

// Search guards
pub const MAX_QUERY_LENGTH: usize = 512;
pub const MAX_SEARCH_LIMIT: usize = 100;
pub const PREVIEW_CHARS: usize = 200;

/// Directory under the project root that holds the project space.
pub const PROJECT_SPACE_DIR: &str = ".ai";

#[derive(Debug, Clone)]
pub struct RyeConfig {
    pub project_path: Option<PathBuf>,
    pub user_space: PathBuf,
    pub system_space: PathBuf,
    pub cache_ttl: Duration,
    pub max_cache_size: usize,
}

impl RyeConfig {
    pub fn new(
        project_path: Option<PathBuf>,
        user_space: impl Into<PathBuf>,
        system_space: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_path,
            user_space: user_space.into(),
            system_space: system_space.into(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
        }
    }

    /// Build a config from `USER_SPACE`, `RYE_SYSTEM_SPACE`, `RYE_CACHE_TTL`
    /// and `RYE_CACHE_MAX_ENTRIES`.
    pub fn from_env(project_path: Option<PathBuf>) -> Self {
        let user_space = std::env::var_os("USER_SPACE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(PROJECT_SPACE_DIR)))
            .unwrap_or_else(|| PathBuf::from(PROJECT_SPACE_DIR));

        let system_space = std::env::var_os("RYE_SYSTEM_SPACE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                project_path
                    .as_deref()
                    .unwrap_or_else(|| Path::new("."))
                    .join(".ai-system")
            });

        let ttl = env_parse("RYE_CACHE_TTL").unwrap_or(DEFAULT_CACHE_TTL_SECS);
        let max_entries = env_parse("RYE_CACHE_MAX_ENTRIES").unwrap_or(DEFAULT_MAX_CACHE_SIZE);

        Self::new(project_path, user_space, system_space)
            .with_cache(Duration::from_secs(ttl), max_entries)
    }

    pub fn with_cache(mut self, ttl: Duration, max_cache_size: usize) -> Self {
        self.cache_ttl = ttl;
        self.max_cache_size = max_cache_size.max(1);
        self
    }

    /// Root directory of a space, or `None` for the project space when no
    /// project is configured.
    pub fn space_root(&self, space: Space) -> Option<PathBuf> {
        match space {
            Space::Project => self
                .project_path
                .as_ref()
                .map(|p| p.join(PROJECT_SPACE_DIR)),
            Space::User => Some(self.user_space.clone()),
            Space::System => Some(self.system_space.clone()),
        }
    }

    /// Type directories for `item_type` in precedence order, existing ones only.
    pub fn type_dirs(&self, item_type: ItemType) -> Vec<(PathBuf, Space)> {
        Space::ALL
            .iter()
            .filter_map(|&space| {
                let dir = self.space_root(space)?.join(item_type.type_dir());
                dir.is_dir().then_some((dir, space))
            })
            .collect()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// Interpret a boolean environment toggle; unset means `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => !matches!(
            v.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        Err(_) => default,
    }
}

pub fn clamp_limit(value: usize, maximum: usize) -> usize {
    value.clamp(1, maximum.max(1))
}

/// Trim a query and cut it to `MAX_QUERY_LENGTH` characters.
pub fn truncate_query(query: &str) -> String {
    let stripped = query.trim();
    match stripped.char_indices().nth(MAX_QUERY_LENGTH) {
        Some((idx, _)) => stripped[..idx].to_string(),
        None => stripped.to_string(),
    }
}
