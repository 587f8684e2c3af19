//! # Tolerant Consistency Check
//!
//! Compares a source document (the legacy flat shape) with a target
//! document (the nested shape) leaf by leaf and classifies every source
//! leaf that is not found verbatim at the same path.
//!
//! ## Classification Order
//!
//! For each non-empty source leaf, after kebab → snake path normalization:
//!
//! 1. Same path, equal value: match.
//! 2. Equal value elsewhere in the target: [`DiscrepancyKind::DifferentKey`].
//!    Booleans and zero numbers only match a target leaf with the same
//!    field name. Everywhere else they would match unrelated flags and
//!    counters.
//! 3. Equivalent value in another format: [`DiscrepancyKind::DifferentFormat`].
//!    Number vs numeric string, `Y`/`N` vs boolean, and a scalar vs a
//!    singleton list or object wrapping it.
//! 4. Same path present: `EmptyOnTarget` if empty there, else
//!    `ValueMismatch`.
//! 5. Otherwise `NotFound`.
//!
//! An empty source leaf is skipped when the target is also empty or absent
//! at that path, and reported as `EmptyOnSource` when the target has data.
//!
//! When several target leaves qualify, the one sharing the longest path
//! suffix with the source leaf wins.
//!
//! The check never fails. Everything, including documents that cannot be
//! compared, is reported as data.

use std::ops::Bound;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flatten::{field_name, flatten, normalize_path, segments, FlatMap};

/// How much of the result to report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMode {
    /// Only entries that make the check fail.
    Terse,
    /// Every entry, including tolerated ones.
    #[default]
    Verbose,
}

/// Classification of one discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Same value under a different path.
    DifferentKey,
    /// Equivalent value in a different representation.
    DifferentFormat,
    /// No counterpart in the target.
    NotFound,
    /// Same path, different value.
    ValueMismatch,
    /// Source empty, target has data.
    EmptyOnSource,
    /// Source has data, target empty.
    EmptyOnTarget,
}

impl DiscrepancyKind {
    /// Whether the entry still counts as consistent.
    pub fn is_tolerated(&self) -> bool {
        matches!(self, Self::DifferentKey | Self::DifferentFormat)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DifferentKey => "found with different key",
            Self::DifferentFormat => "found with different format",
            Self::NotFound => "not found",
            Self::ValueMismatch => "value mismatch",
            Self::EmptyOnSource => "empty on source",
            Self::EmptyOnTarget => "empty on target",
        }
    }
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Field name of the source leaf.
    pub field: String,
    /// Path in the source document.
    pub sac_path: String,
    pub sac_value: Value,
    /// Path in the target document, when a counterpart was found.
    pub audit_path: Option<String>,
    pub audit_value: Option<Value>,
    pub error: DiscrepancyKind,
}

/// Outcome of a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    /// No non-tolerated discrepancy was found.
    pub ok: bool,
    pub discrepancies: Vec<Discrepancy>,
}

impl CheckReport {
    /// Entries of one kind.
    pub fn of_kind(&self, kind: DiscrepancyKind) -> impl Iterator<Item = &Discrepancy> {
        self.discrepancies.iter().filter(move |d| d.error == kind)
    }
}

/// Compare `source` against `target`.
pub fn check(source: &Value, target: &Value, mode: CheckMode) -> CheckReport {
    let src = normalized(flatten(source));
    let tgt = normalized(flatten(target));

    let src_empty = src.values().all(is_empty);
    let tgt_empty = tgt.values().all(is_empty);
    let mut found = match (src_empty, tgt_empty) {
        (true, true) => Vec::new(),
        (true, false) => vec![whole_document(DiscrepancyKind::EmptyOnSource)],
        (false, true) => vec![whole_document(DiscrepancyKind::EmptyOnTarget)],
        (false, false) => src
            .iter()
            .filter_map(|(path, value)| classify(path, value, &src, &tgt))
            .collect(),
    };

    let ok = found.iter().all(|d| d.error.is_tolerated());
    if mode == CheckMode::Terse {
        found.retain(|d| !d.error.is_tolerated());
    }
    tracing::debug!(ok, discrepancies = found.len(), "consistency check");
    CheckReport {
        ok,
        discrepancies: found,
    }
}

fn normalized(flat: FlatMap) -> FlatMap {
    flat.into_iter()
        .map(|(path, value)| (normalize_path(&path), value))
        .collect()
}

fn whole_document(kind: DiscrepancyKind) -> Discrepancy {
    Discrepancy {
        field: String::new(),
        sac_path: String::new(),
        sac_value: Value::Null,
        audit_path: None,
        audit_value: None,
        error: kind,
    }
}

fn classify(path: &str, value: &Value, src: &FlatMap, tgt: &FlatMap) -> Option<Discrepancy> {
    let same_path = tgt.get(path);
    let entry = |kind: DiscrepancyKind, at: Option<(&String, &Value)>| Discrepancy {
        field: field_name(path).to_string(),
        sac_path: path.to_string(),
        sac_value: value.clone(),
        audit_path: at.map(|(p, _)| p.clone()),
        audit_value: at.map(|(_, v)| v.clone()),
        error: kind,
    };

    if is_empty(value) {
        return match tgt.get_key_value(path) {
            Some(hit) if !is_empty(hit.1) => Some(entry(DiscrepancyKind::EmptyOnSource, Some(hit))),
            _ => None,
        };
    }

    if same_path == Some(value) {
        return None;
    }

    let searchable = is_searchable(value);
    if let Some(hit) = best_match(path, tgt, |_, v| searchable && v == value) {
        return Some(entry(DiscrepancyKind::DifferentKey, Some(hit)));
    }

    if let Some(hit) = format_match(path, value, src, tgt) {
        return Some(entry(DiscrepancyKind::DifferentFormat, Some(hit)));
    }

    match tgt.get_key_value(path) {
        Some(hit) if is_empty(hit.1) => Some(entry(DiscrepancyKind::EmptyOnTarget, Some(hit))),
        Some(hit) => Some(entry(DiscrepancyKind::ValueMismatch, Some(hit))),
        None => Some(entry(DiscrepancyKind::NotFound, None)),
    }
}

/// Step 3: an equivalent value in another representation.
fn format_match<'t>(
    path: &str,
    value: &Value,
    src: &FlatMap,
    tgt: &'t FlatMap,
) -> Option<(&'t String, &'t Value)> {
    // Same path.
    if let Some(hit) = tgt.get_key_value(path).filter(|(_, v)| equivalent(value, v)) {
        return Some(hit);
    }

    // Target wraps the scalar: `a` vs `a[0]` or `a.x`.
    if let [hit] = children(tgt, path).as_slice() {
        if equivalent(value, hit.1) {
            return Some(*hit);
        }
    }

    // Source wraps the scalar: `a[0]` vs `a`.
    if let Some(parent) = parent_path(path) {
        if children(src, parent).len() == 1 {
            if let Some(hit) = tgt.get_key_value(parent).filter(|(_, v)| equivalent(value, v)) {
                return Some(hit);
            }
        }
    }

    // Same field name elsewhere. Booleans and zeros only match in place.
    if !is_searchable(value) {
        return None;
    }
    let name = field_name(path);
    best_match(path, tgt, |p, v| field_name(p) == name && equivalent(value, v))
}

/// Leaves strictly under `path`.
fn children<'m>(map: &'m FlatMap, path: &str) -> Vec<(&'m String, &'m Value)> {
    map.range::<str, _>((Bound::Excluded(path), Bound::Unbounded))
        .take_while(|(p, _)| p.starts_with(path))
        .filter(|(p, _)| {
            path.is_empty() || matches!(p.as_bytes().get(path.len()), Some(b'.' | b'['))
        })
        .collect()
}

fn parent_path(path: &str) -> Option<&str> {
    if let Some(stripped) = path.strip_suffix(']') {
        return stripped.rfind('[').map(|at| &path[..at]);
    }
    path.rfind('.').map(|at| &path[..at])
}

/// The qualifying target leaf sharing the longest path suffix with `path`.
fn best_match<'t>(
    path: &str,
    tgt: &'t FlatMap,
    qualifies: impl Fn(&str, &Value) -> bool,
) -> Option<(&'t String, &'t Value)> {
    // Reversed so ties resolve to the first path in sorted order.
    tgt.iter()
        .rev()
        .filter(|(p, v)| qualifies(p, v))
        .max_by_key(|(p, _)| common_suffix(path, p))
}

fn common_suffix(a: &str, b: &str) -> usize {
    segments(a)
        .rev()
        .zip(segments(b).rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Null, blank strings and empty containers.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Whether a value may match by value alone, ignoring its path.
fn is_searchable(value: &Value) -> bool {
    match value {
        Value::Bool(_) => false,
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

/// Type-tolerant scalar equivalence.
fn equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            let s = s.trim();
            s == n.to_string() || matches!((s.parse::<f64>(), n.as_f64()), (Ok(x), Some(y)) if x == y)
        }
        (Value::Bool(flag), Value::String(s)) | (Value::String(s), Value::Bool(flag)) => {
            let s = s.trim();
            if *flag {
                s.eq_ignore_ascii_case("y") || s.eq_ignore_ascii_case("true")
            } else {
                s.eq_ignore_ascii_case("n") || s.eq_ignore_ascii_case("false")
            }
        }
        (Value::String(x), Value::String(y)) => x.trim() == y.trim(),
        _ => a == b,
    }
}
