//! Criterion benchmarks for rye-core.
//!
//! ## Benchmark groups
//!
//! 1. **query**: query parsing, matching, and edit distance.
//! 2. **templating**: shell-safe config templating.
//! 3. **chain**: chain validation and cached chain resolution.
//! 4. **cache**: fingerprint cache lookups and inserts.
//! 5. **search**: end-to-end search over a synthetic tool tree.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/rye-core/Cargo.toml
//! # Run only the templating group:
//! cargo bench --manifest-path crates/rye-core/Cargo.toml -- templating
//! ```

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use tempfile::TempDir;

use _rye_core::cache::{Fingerprint, FingerprintCache};
use _rye_core::chain::{template_config, ChainLink, ChainValidator, PrimitiveExecutor};
use _rye_core::config::RyeConfig;
use _rye_core::env::Env;
use _rye_core::models::ItemType;
use _rye_core::query::{levenshtein_distance, Query, SearchEngine, SearchOptions};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_tool(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

/// Project space with `count` tools plus a runtime and a primitive.
fn synthetic_project(count: usize) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let tools = tmp.path().join(".ai").join("tools");
    write_tool(
        &tools,
        "core/subprocess.py",
        "__version__ = \"1.0.0\"\n__tool_type__ = \"primitive\"\n__executor_id__ = None\n",
    );
    write_tool(
        &tools,
        "core/python_runtime.yaml",
        "version: \"1.0.0\"\ntool_type: runtime\nexecutor_id: core/subprocess\n\
         config:\n  command: \"${PYTHON:-python3}\"\n",
    );
    for i in 0..count {
        let body = format!(
            "\"\"\"Tool number {i} that parses and transforms data.\"\"\"\n\
             __version__ = \"1.{i}.0\"\n\
             __tool_type__ = \"python\"\n\
             __executor_id__ = \"core/python_runtime\"\n\
             __category__ = \"{}\"\n",
            if i % 2 == 0 { "data" } else { "network" }
        );
        write_tool(&tools, &format!("tool_{i}.py"), &body);
    }
    tmp
}

fn config_for(tmp: &TempDir) -> RyeConfig {
    RyeConfig::new(
        Some(tmp.path().to_path_buf()),
        tmp.path().join("user"),
        tmp.path().join("system"),
    )
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    group.bench_function("parse_simple", |b| {
        b.iter(|| Query::parse(black_box("python runtime")));
    });

    group.bench_function("parse_boolean", |b| {
        b.iter(|| {
            Query::parse(black_box(
                "(deploy OR release) AND NOT staging AND \"blue green\" AND k8s*",
            ))
        });
    });

    let query = Query::parse("(deploy OR release) AND NOT staging AND k8s*");
    let text = "release pipeline for k8s clusters with canary rollout ".repeat(20);
    group.bench_function("match_exact", |b| {
        b.iter(|| query.matches(black_box(&text), 0));
    });
    group.bench_function("match_fuzzy", |b| {
        b.iter(|| query.matches(black_box(&text), 2));
    });

    for (a, b_str) in [("kitten", "sitting"), ("subprocess", "subprocesses")] {
        group.bench_with_input(
            BenchmarkId::new("levenshtein", format!("{a}-{b_str}")),
            &(a, b_str),
            |b, (x, y)| b.iter(|| levenshtein_distance(black_box(x), black_box(y))),
        );
    }

    group.finish();
}

fn bench_templating(c: &mut Criterion) {
    let mut group = c.benchmark_group("templating");

    let env: Env = [
        ("PYTHON", "/usr/bin/python3"),
        ("SCRIPT", "main.py"),
        ("HOME", "/home/user"),
        ("PAYLOAD", "$(rm -rf /); echo pwned"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let config = json!({
        "command": "${PYTHON}",
        "args": ["${SCRIPT}", "--home", "${HOME}/app", "{tool_path}"],
        "tool_path": "${HOME}/tools/run.py",
        "nested": {"payload": "echo ${PAYLOAD}", "missing": "${NOPE:-fallback}"},
        "timeout": 300,
    });

    group.bench_function("template_config", |b| {
        b.iter(|| template_config(black_box(&config), black_box(&env)));
    });

    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");

    let validator = ChainValidator::new();
    let chain: Vec<ChainLink> = serde_json::from_value(json!([
        {"item_id": "tool", "space": "project", "outputs": ["json"], "version": "1.5.0"},
        {"item_id": "runtime", "space": "user", "inputs": ["json"],
         "child_constraints": {"tool": {"min_version": "1.0.0", "max_version": "2.0.0"}}},
        {"item_id": "subprocess", "space": "system"},
    ]))
    .unwrap();
    group.bench_function("validate_chain", |b| {
        b.iter(|| validator.validate_chain(black_box(&chain)));
    });

    let tmp = synthetic_project(10);
    let executor = PrimitiveExecutor::new(config_for(&tmp));
    executor.build_chain("tool_0", false).unwrap();
    group.bench_function("build_chain_cached", |b| {
        b.iter(|| executor.build_chain(black_box("tool_0"), false).unwrap());
    });
    group.bench_function("build_chain_forced", |b| {
        b.iter(|| executor.build_chain(black_box("tool_0"), true).unwrap());
    });

    group.finish();
}

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");

    let fingerprint = Fingerprint {
        modified: SystemTime::UNIX_EPOCH,
        size: 42,
    };
    let cache: FingerprintCache<String> = FingerprintCache::new(Duration::from_secs(300), 1000);
    for i in 0..1000 {
        cache.insert(format!("key-{i}"), format!("value-{i}"), fingerprint);
    }

    group.bench_function("get_hit", |b| {
        b.iter(|| cache.get(black_box("key-500"), Some(&fingerprint)));
    });
    group.bench_function("get_miss", |b| {
        b.iter(|| cache.get(black_box("absent"), Some(&fingerprint)));
    });
    group.bench_function("insert_evicting", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            cache.insert(format!("new-{n}"), String::new(), fingerprint);
        });
    });

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(20);

    let tmp = synthetic_project(200);
    let engine = SearchEngine::new(config_for(&tmp));
    let mut options = SearchOptions::new("data AND parses", ItemType::Tool);
    options.limit = 20;

    group.bench_function("tools_200", |b| {
        b.iter(|| engine.search(black_box(&options)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_query,
    bench_templating,
    bench_chain,
    bench_cache,
    bench_search
);
criterion_main!(benches);
