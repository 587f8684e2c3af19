//! Path flattening for nested JSON documents.
//!
//! Object keys join with `.`, list positions append `[i]`:
//!
//! ```text
//! {"a": {"b": [10, {"c": true}]}}  →  a.b[0] = 10
//!                                     a.b[1].c = true
//! ```
//!
//! Scalars, nulls and empty containers are leaves. A scalar root has the
//! empty path. Flattening builds a new map; the input is never touched.
//!
//! Keys are not escaped. A key containing `.` or `[` can spell the same path
//! as a nested leaf (`{"a.b": 1, "a": {"b": 2}}`); when that happens the
//! leaf written first in key order is kept, which is the one [`lookup`]
//! resolves. Intake and dissemination documents never use such keys.

use std::collections::BTreeMap;

use serde_json::Value;

/// Leaf path → leaf value.
pub type FlatMap = BTreeMap<String, Value>;

/// Flatten `value` into a path map.
pub fn flatten(value: &Value) -> FlatMap {
    let mut out = FlatMap::new();
    descend(String::new(), value, &mut out);
    out
}

fn descend(path: String, value: &Value, out: &mut FlatMap) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                descend(child_path, child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                descend(format!("{path}[{i}]"), child, out);
            }
        }
        leaf => {
            out.entry(path).or_insert_with(|| leaf.clone());
        }
    }
}

/// Resolve a flattened path against a document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(doc);
    }
    let mut cursor = doc;
    for segment in path.split('.') {
        let (key, mut indices) = match segment.find('[') {
            Some(at) => segment.split_at(at),
            None => (segment, ""),
        };
        if !key.is_empty() {
            cursor = cursor.get(key)?;
        }
        while let Some(rest) = indices.strip_prefix('[') {
            let close = rest.find(']')?;
            let index: usize = rest[..close].parse().ok()?;
            cursor = cursor.get(index)?;
            indices = &rest[close + 1..];
        }
        if !indices.is_empty() {
            return None;
        }
    }
    Some(cursor)
}

/// Normalize kebab-case keys to snake_case.
pub fn normalize_path(path: &str) -> String {
    path.replace('-', "_")
}

/// Path segments, e.g. `a.b[0].c` → `["a", "b[0]", "c"]`.
pub(crate) fn segments(path: &str) -> impl DoubleEndedIterator<Item = &str> {
    path.split('.')
}

/// The key name of the last segment, without list indices.
pub fn field_name(path: &str) -> &str {
    let last = segments(path).next_back().unwrap_or_default();
    last.split('[').next().unwrap_or_default()
}
