//! Keyword search over items in the three spaces.
//!
//! Candidates are every non-`_`-prefixed file under the selected spaces'
//! type directory.  Metadata extraction is cached per file, matching and
//! scoring run on a rayon pool, and the result is sorted then paginated.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::filters::{FieldSource, FilterMatcher};
use super::parser::Query;
use crate::cache::{CacheStats, Fingerprint, FingerprintCache};
use crate::config::{
    clamp_limit, env_flag, truncate_query, RyeConfig, MAX_SEARCH_LIMIT, PREVIEW_CHARS,
};
use crate::extract::{scalar_string, Extractor};
use crate::models::{ItemType, Space};

const FIELD_WEIGHTS: &[(&str, f64)] = &[
    ("title", 3.0),
    ("name", 3.0),
    ("description", 2.0),
    ("category", 1.5),
    ("content", 1.0),
];

/// Extracted fields that are configuration blobs rather than metadata.
const NON_METADATA_FIELDS: &[&str] = &["config", "env_config", "config_schema"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    #[default]
    Project,
    User,
    System,
    All,
}

impl SearchSource {
    fn includes(self, space: Space) -> bool {
        match self {
            SearchSource::All => true,
            SearchSource::Project => space == Space::Project,
            SearchSource::User => space == Space::User,
            SearchSource::System => space == Space::System,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Score,
    Date,
    Name,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyOptions {
    pub enabled: bool,
    pub max_distance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub query: String,
    pub item_type: ItemType,
    pub source: SearchSource,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: SortBy,
    pub fields: IndexMap<String, String>,
    pub filters: Map<String, Value>,
    pub fuzzy: FuzzyOptions,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            query: String::new(),
            item_type: ItemType::Tool,
            source: SearchSource::Project,
            limit: 10,
            offset: 0,
            sort_by: SortBy::Score,
            fields: IndexMap::new(),
            filters: Map::new(),
            fuzzy: FuzzyOptions::default(),
        }
    }
}

impl SearchOptions {
    pub fn new(query: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            query: query.into(),
            item_type,
            ..Self::default()
        }
    }

    fn fuzzy_distance(&self) -> usize {
        if self.fuzzy.enabled {
            self.fuzzy.max_distance
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub preview: String,
    pub source: Space,
    pub path: PathBuf,
    pub item_type: ItemType,
    pub score: f64,
    pub metadata: Map<String, Value>,
}

impl SearchHit {
    /// Text of a named field as used for matching and scoring.
    pub fn field_text(&self, field: &str) -> String {
        match field {
            "id" => self.id.clone(),
            "name" => self.name.clone(),
            "title" => self.title.clone(),
            "description" => self.description.clone(),
            "category" => self.category.clone().unwrap_or_default(),
            "content" | "preview" => self.preview.clone(),
            other => self
                .metadata
                .get(other)
                .and_then(scalar_string)
                .unwrap_or_default(),
        }
    }

    fn searchable_text(&self) -> String {
        [
            self.name.as_str(),
            self.title.as_str(),
            self.description.as_str(),
            self.category.as_deref().unwrap_or(""),
            self.preview.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    fn created_at(&self) -> String {
        self.metadata
            .get("created_at")
            .and_then(scalar_string)
            .unwrap_or_default()
    }
}

impl FieldSource for SearchHit {
    fn field(&self, name: &str) -> Option<Value> {
        let direct = match name {
            "id" => Some(&self.id),
            "name" => Some(&self.name),
            "title" => Some(&self.title),
            "description" => Some(&self.description),
            "preview" => Some(&self.preview),
            "category" => self.category.as_ref(),
            _ => None,
        };
        match direct {
            Some(text) if !text.is_empty() => Some(Value::String(text.clone())),
            _ if name == "source" => Some(Value::String(self.source.to_string())),
            _ => self.metadata.get(name).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub query: String,
    pub item_type: ItemType,
    pub source: SearchSource,
    pub limit: usize,
    pub offset: usize,
}

pub struct SearchEngine {
    config: RyeConfig,
    workers: usize,
    metadata_cache: FingerprintCache<SearchHit>,
}

impl SearchEngine {
    pub fn new(config: RyeConfig) -> Self {
        let workers = if env_flag("RYE_PARALLEL_SEARCH", true) {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            1
        };
        let metadata_cache = FingerprintCache::new(config.cache_ttl, config.max_cache_size);
        Self {
            config,
            workers,
            metadata_cache,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn search(&self, options: &SearchOptions) -> SearchResponse {
        let query_text = truncate_query(&options.query);
        let query = Query::parse(&query_text);
        let field_queries: Vec<(String, Query)> = options
            .fields
            .iter()
            .map(|(field, q)| (field.clone(), Query::parse(&truncate_query(q))))
            .collect();
        let fuzzy = options.fuzzy_distance();
        let filters = FilterMatcher::new(&options.filters);
        let unscored = query_text.is_empty() && field_queries.is_empty();

        let candidates = self.candidate_files(options.item_type, options.source);
        debug!(
            item_type = %options.item_type,
            query = %query_text,
            candidates = candidates.len(),
            "search"
        );

        let evaluate = |(path, space): &(PathBuf, Space)| -> Option<SearchHit> {
            let mut hit = self.load_item(path, *space, options.item_type)?;
            if !query.matches(&hit.searchable_text(), fuzzy) {
                return None;
            }
            if !field_queries
                .iter()
                .all(|(field, q)| q.matches(&hit.field_text(field), fuzzy))
            {
                return None;
            }
            if !filters.matches(&hit) {
                return None;
            }
            hit.score = if unscored {
                1.0
            } else {
                score_item(&hit, &query, &field_queries, fuzzy)
            };
            Some(hit)
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build();
        let mut results: Vec<SearchHit> = match pool {
            Ok(pool) if self.workers > 1 => {
                pool.install(|| candidates.par_iter().filter_map(evaluate).collect())
            }
            _ => candidates.iter().filter_map(evaluate).collect(),
        };

        sort_results(&mut results, options.sort_by);
        let total = results.len();
        let limit = clamp_limit(options.limit, MAX_SEARCH_LIMIT);
        let page: Vec<SearchHit> = results
            .into_iter()
            .skip(options.offset)
            .take(limit)
            .collect();

        SearchResponse {
            results: page,
            total,
            query: query_text,
            item_type: options.item_type,
            source: options.source,
            limit,
            offset: options.offset,
        }
    }

    pub fn clear_cache(&self) {
        self.metadata_cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.metadata_cache.stats()
    }

    fn candidate_files(&self, item_type: ItemType, source: SearchSource) -> Vec<(PathBuf, Space)> {
        let mut files = Vec::new();
        for (dir, space) in self.config.type_dirs(item_type) {
            if !source.includes(space) {
                continue;
            }
            for entry in WalkDir::new(&dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.file_name().to_string_lossy().starts_with('_') {
                    continue;
                }
                files.push((entry.into_path(), space));
            }
        }
        files
    }

    fn load_item(&self, path: &Path, space: Space, item_type: ItemType) -> Option<SearchHit> {
        let key = path.to_string_lossy();
        let fingerprint = Fingerprint::of(path);
        if let Some(hit) = self.metadata_cache.get(&key, fingerprint.as_ref()) {
            return Some(hit);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping unreadable item");
                return None;
            }
        };
        let fields = match Extractor::for_item(item_type, path).map(|e| e.extract(&content)) {
            Some(Ok(fields)) => fields,
            Some(Err(err)) => {
                warn!(path = %path.display(), error = %err, "metadata extraction failed");
                Map::new()
            }
            None => Map::new(),
        };
        let hit = build_hit(path, space, item_type, &content, fields);
        if let Some(fp) = fingerprint {
            self.metadata_cache.insert(key.into_owned(), hit.clone(), fp);
        }
        Some(hit)
    }
}

fn build_hit(
    path: &Path,
    space: Space,
    item_type: ItemType,
    content: &str,
    fields: Map<String, Value>,
) -> SearchHit {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = |key: &str| fields.get(key).and_then(scalar_string).filter(|s| !s.is_empty());

    let name = match item_type {
        ItemType::Directive => text("name").unwrap_or_else(|| stem.clone()),
        _ => stem.clone(),
    };
    let title = match item_type {
        ItemType::Knowledge => text("title").unwrap_or_else(|| name.clone()),
        _ => name.clone(),
    };
    let id = match item_type {
        ItemType::Knowledge => text("id").unwrap_or_else(|| stem.clone()),
        _ => stem,
    };

    let mut metadata = Map::new();
    for (key, value) in &fields {
        let skip = NON_METADATA_FIELDS.contains(&key.as_str())
            || matches!(key.as_str(), "name" | "title" | "description");
        if !skip {
            metadata.insert(key.clone(), value.clone());
        }
    }

    SearchHit {
        id,
        name,
        title,
        description: text("description").unwrap_or_default(),
        category: text("category"),
        preview: content.chars().take(PREVIEW_CHARS).collect(),
        source: space,
        path: path.to_path_buf(),
        item_type,
        score: 0.0,
        metadata,
    }
}

/// Fraction of the weighted fields the query matches, in `[0, 1]`.
fn score_item(hit: &SearchHit, query: &Query, field_queries: &[(String, Query)], fuzzy: usize) -> f64 {
    let mut total = 0.0;
    let mut max = 0.0;
    for (field, weight) in FIELD_WEIGHTS {
        max += weight;
        if query.matches(&hit.field_text(field), fuzzy) {
            total += weight;
        }
    }
    for (field, field_query) in field_queries {
        let weight = FIELD_WEIGHTS
            .iter()
            .find(|(name, _)| *name == field.as_str())
            .map_or(1.0, |(_, w)| *w);
        max += weight;
        if field_query.matches(&hit.field_text(field), fuzzy) {
            total += weight;
        }
    }
    if max > 0.0 {
        (total / max).min(1.0)
    } else {
        0.0
    }
}

fn sort_results(results: &mut [SearchHit], sort_by: SortBy) {
    match sort_by {
        SortBy::Score => results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
        }),
        SortBy::Date => results.sort_by_key(|hit| std::cmp::Reverse(hit.created_at())),
        SortBy::Name => results.sort_by_key(|hit| hit.name.to_lowercase()),
    }
}
