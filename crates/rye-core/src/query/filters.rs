//! Meta-field filters applied to search candidates.
//!
//! Filter values:
//! - `"!x"`: field differs from `x`
//! - `">=v"`, `"<=v"`, `">v"`, `"<v"`: version comparison
//! - a list: field equals one of the entries
//! - any other string: case-insensitive equality (membership for list fields)
//!
//! `date_from` / `date_to` bound the item's `created_at`.  A candidate that
//! lacks a filtered field fails the filter; one that lacks a date passes
//! the date bounds.

use serde_json::{Map, Value};

use crate::extract::scalar_string;
use crate::version::version_satisfies;

const VERSION_OPERATORS: &[&str] = &[">=", "<=", ">", "<"];

/// Anything that can expose named fields to the filter matcher.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<Value>;
}

impl FieldSource for Map<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

pub struct FilterMatcher<'a> {
    filters: &'a Map<String, Value>,
}

impl<'a> FilterMatcher<'a> {
    pub fn new(filters: &'a Map<String, Value>) -> Self {
        Self { filters }
    }

    pub fn matches(&self, item: &dyn FieldSource) -> bool {
        self.filters.iter().all(|(field, expected)| match field.as_str() {
            "date_from" => date_bound(item, expected, |item_date, bound| item_date >= bound),
            "date_to" => date_bound(item, expected, |item_date, bound| item_date <= bound),
            _ => match item.field(field).filter(|v| !v.is_null()) {
                Some(actual) => value_matches(&actual, expected),
                None => false,
            },
        })
    }
}

fn value_matches(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(options) => options.iter().any(|option| value_matches(actual, option)),
        Value::String(filter) => {
            if let Some(negated) = filter.strip_prefix('!') {
                return !equals_ignore_case(actual, negated);
            }
            for op in VERSION_OPERATORS {
                if let Some(bound) = filter.strip_prefix(op) {
                    return scalar_string(actual)
                        .is_some_and(|version| version_satisfies(&version, op, bound.trim()));
                }
            }
            equals_ignore_case(actual, filter)
        }
        other => match actual {
            Value::Array(items) => items.contains(other),
            _ => actual == other,
        },
    }
}

fn equals_ignore_case(actual: &Value, expected: &str) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| equals_ignore_case(item, expected)),
        _ => scalar_string(actual).is_some_and(|a| a.to_lowercase() == expected.to_lowercase()),
    }
}

/// Normalize an ISO-8601 timestamp so that lexical order is time order for
/// same-offset values (`Z` becomes `+00:00`, `T` and space are equivalent).
fn normalize_date(raw: &str) -> String {
    raw.trim().replace('Z', "+00:00").replacen(' ', "T", 1)
}

fn date_bound(item: &dyn FieldSource, bound: &Value, cmp: fn(&str, &str) -> bool) -> bool {
    let Some(item_date) = item.field("created_at").as_ref().and_then(scalar_string) else {
        return true;
    };
    let Some(bound) = scalar_string(bound) else {
        return true;
    };
    let (item_date, bound) = (normalize_date(&item_date), normalize_date(&bound));
    if item_date.is_empty() || bound.is_empty() {
        return true;
    }
    // A date-only bound compares against the date part of the item.
    let item_date = if bound.len() == 10 && item_date.len() > 10 {
        item_date[..10].to_string()
    } else {
        item_date
    };
    cmp(&item_date, &bound)
}
