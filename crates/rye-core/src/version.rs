//! Dotted version comparison shared by chain constraints and search filters.

use std::cmp::Ordering;

use tracing::warn;

struct ParsedVersion<'a> {
    parts: Vec<u64>,
    pre_release: Option<&'a str>,
}

fn parse_version(version: &str) -> ParsedVersion<'_> {
    let trimmed = version.trim().trim_start_matches(['v', 'V']);
    let without_build = trimmed.split_once('+').map_or(trimmed, |(core, _)| core);
    let (core, pre_release) = match without_build.split_once('-') {
        Some((core, pre)) => (core, Some(pre).filter(|p| !p.is_empty())),
        None => (without_build, None),
    };
    let parts = core
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect();
    ParsedVersion { parts, pre_release }
}

/// Compare two dotted versions.
///
/// Short forms are zero-padded (`1.0 == 1.0.0`) and non-numeric components
/// weigh zero.  On a numeric tie a pre-release suffix sorts first
/// (`1.0.0-alpha < 1.0.0`); two suffixes compare lexically.
pub fn compare_version(a: &str, b: &str) -> Ordering {
    let left = parse_version(a);
    let right = parse_version(b);
    let width = left.parts.len().max(right.parts.len()).max(3);

    for idx in 0..width {
        let x = left.parts.get(idx).copied().unwrap_or(0);
        let y = right.parts.get(idx).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    match (left.pre_release, right.pre_release) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(y),
    }
}

/// Check `version <op> constraint` for `>=`, `<=`, `>`, `<`, `==` and `!=`.
pub fn version_satisfies(version: &str, op: &str, constraint: &str) -> bool {
    let ord = compare_version(version, constraint);
    match op.trim() {
        ">=" => ord != Ordering::Less,
        "<=" => ord != Ordering::Greater,
        ">" => ord == Ordering::Greater,
        "<" => ord == Ordering::Less,
        "==" | "=" => ord == Ordering::Equal,
        "!=" => ord != Ordering::Equal,
        other => {
            warn!(op = other, "unknown version operator");
            false
        }
    }
}
