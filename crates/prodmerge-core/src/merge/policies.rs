//! Merge policies: pure reductions from one column's values across a group
//! to a single merged value.
//!
//! Every function sees the whole group, absent values included, and filters
//! what it cannot use before doing its work. Only the two consistency
//! checks can refuse to merge.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::config::MergeSettings;
use crate::error::{DedupError, Result};
use crate::merge::conflict::{ConflictKind, MergeConflict};
use crate::value::{Item, Scalar, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergePolicy {
    ShortestString,
    LongestString,
    UnionDelimited { delimiter: String },
    ConsistentScalar,
    UnionDomains { separator: String },
    ConsistentBoolean,
    MaxNumeric,
    UnionAtoms,
    UnionRecords,
    TakeFirst,
}

impl MergePolicy {
    pub const NAMES: [&'static str; 10] = [
        "shortest-valid-string",
        "longest-valid-string",
        "union-delimited-string",
        "consistency-checked-scalar",
        "union-of-domains-string",
        "consistency-checked-boolean",
        "max-numeric",
        "union-of-atoms",
        "union-of-structured-records",
        "take-first",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MergePolicy::ShortestString => "shortest-valid-string",
            MergePolicy::LongestString => "longest-valid-string",
            MergePolicy::UnionDelimited { .. } => "union-delimited-string",
            MergePolicy::ConsistentScalar => "consistency-checked-scalar",
            MergePolicy::UnionDomains { .. } => "union-of-domains-string",
            MergePolicy::ConsistentBoolean => "consistency-checked-boolean",
            MergePolicy::MaxNumeric => "max-numeric",
            MergePolicy::UnionAtoms => "union-of-atoms",
            MergePolicy::UnionRecords => "union-of-structured-records",
            MergePolicy::TakeFirst => "take-first",
        }
    }

    /// Resolve a kebab-case policy name; delimiters come from `settings`.
    pub fn from_name(name: &str, settings: &MergeSettings) -> Result<Self> {
        let policy = match name {
            "shortest-valid-string" => MergePolicy::ShortestString,
            "longest-valid-string" => MergePolicy::LongestString,
            "union-delimited-string" => MergePolicy::UnionDelimited {
                delimiter: settings.code_delimiter.clone(),
            },
            "consistency-checked-scalar" => MergePolicy::ConsistentScalar,
            "union-of-domains-string" => MergePolicy::UnionDomains {
                separator: settings.domain_separator.clone(),
            },
            "consistency-checked-boolean" => MergePolicy::ConsistentBoolean,
            "max-numeric" => MergePolicy::MaxNumeric,
            "union-of-atoms" => MergePolicy::UnionAtoms,
            "union-of-structured-records" => MergePolicy::UnionRecords,
            "take-first" => MergePolicy::TakeFirst,
            other => return Err(DedupError::UnknownPolicy(other.to_string())),
        };
        Ok(policy)
    }

    /// Policies allowed to divert a group. A conflict from any other policy
    /// is a bug, not a data problem.
    pub fn is_conflict_sensitive(&self) -> bool {
        matches!(
            self,
            MergePolicy::ConsistentScalar | MergePolicy::ConsistentBoolean
        )
    }

    /// Policies whose output is always a sequence.
    pub fn is_collection(&self) -> bool {
        matches!(self, MergePolicy::UnionAtoms | MergePolicy::UnionRecords)
    }

    pub fn apply(&self, values: &[&Value]) -> std::result::Result<Value, MergeConflict> {
        match self {
            MergePolicy::ShortestString => Ok(shortest_valid_string(values)),
            MergePolicy::LongestString => Ok(longest_valid_string(values)),
            MergePolicy::UnionDelimited { delimiter } => {
                Ok(union_delimited_string(values, delimiter))
            }
            MergePolicy::ConsistentScalar => consistency_checked_scalar(values),
            MergePolicy::UnionDomains { separator } => Ok(union_of_domains(values, separator)),
            MergePolicy::ConsistentBoolean => consistency_checked_boolean(values),
            MergePolicy::MaxNumeric => Ok(max_numeric(values)),
            MergePolicy::UnionAtoms => Ok(union_of_atoms(values)),
            MergePolicy::UnionRecords => Ok(union_of_structured_records(values)),
            MergePolicy::TakeFirst => Ok(take_first(values)),
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Text ──────────────────────────────────────────────────

/// Minimum-length non-empty string by character count; first wins ties.
pub fn shortest_valid_string(values: &[&Value]) -> Value {
    pick_string(values, |len, best| len < best)
}

/// Maximum-length non-empty string by character count; first wins ties.
pub fn longest_valid_string(values: &[&Value]) -> Value {
    pick_string(values, |len, best| len > best)
}

fn pick_string(values: &[&Value], replaces: impl Fn(usize, usize) -> bool) -> Value {
    let mut best: Option<(&str, usize)> = None;
    for s in values.iter().filter_map(|v| v.as_str()).filter(|s| !s.is_empty()) {
        let len = s.chars().count();
        if best.is_none_or(|(_, best_len)| replaces(len, best_len)) {
            best = Some((s, len));
        }
    }
    best.map_or(Value::Absent, |(s, _)| Value::str(s))
}

/// Split every value on the delimiter, keep the distinct non-empty tokens,
/// sort them and rejoin. Yields an empty string, never absent.
pub fn union_delimited_string(values: &[&Value], delimiter: &str) -> Value {
    let split_on = match delimiter.trim() {
        "" => delimiter,
        trimmed => trimmed,
    };

    let mut tokens = BTreeSet::new();
    for value in values {
        match value {
            Value::Absent => {}
            Value::Scalar(scalar) => collect_tokens(&scalar.to_string(), split_on, &mut tokens),
            Value::Sequence(items) => {
                for item in items {
                    if let Item::Scalar(scalar) = item {
                        collect_tokens(&scalar.to_string(), split_on, &mut tokens);
                    }
                }
            }
        }
    }

    Value::str(tokens.into_iter().collect::<Vec<_>>().join(delimiter))
}

fn collect_tokens(raw: &str, split_on: &str, tokens: &mut BTreeSet<String>) {
    let pieces: Vec<&str> = if split_on.is_empty() {
        vec![raw]
    } else {
        raw.split(split_on).collect()
    };
    for token in pieces.into_iter().map(str::trim) {
        if !token.is_empty() && token != "nan" {
            tokens.insert(token.to_string());
        }
    }
}

// ─── Identity and trust ────────────────────────────────────

/// The single distinct non-blank value, or a conflict naming all of them.
pub fn consistency_checked_scalar(values: &[&Value]) -> std::result::Result<Value, MergeConflict> {
    let distinct = distinct_in_order(values.iter().copied().filter(|v| !v.is_blank()));
    match distinct.as_slice() {
        [] => Ok(Value::Absent),
        [only] => Ok((*only).clone()),
        many => Err(MergeConflict::new(
            ConflictKind::ScalarMismatch,
            many.iter().map(ToString::to_string).collect(),
        )),
    }
}

/// Every distinct non-blank value, sorted and joined. Never conflicts.
pub fn union_of_domains(values: &[&Value], separator: &str) -> Value {
    let domains: BTreeSet<String> = values
        .iter()
        .filter(|v| !v.is_blank())
        .map(ToString::to_string)
        .collect();
    if domains.is_empty() {
        Value::Absent
    } else {
        Value::str(domains.into_iter().collect::<Vec<_>>().join(separator))
    }
}

/// The single boolean observed, or a conflict when both occur.
pub fn consistency_checked_boolean(values: &[&Value]) -> std::result::Result<Value, MergeConflict> {
    let mut seen: Vec<bool> = Vec::with_capacity(2);
    for flag in values.iter().filter_map(|v| v.as_bool()) {
        if !seen.contains(&flag) {
            seen.push(flag);
        }
    }
    match seen.as_slice() {
        [] => Ok(Value::Absent),
        [flag] => Ok(Value::bool(*flag)),
        _ => Err(MergeConflict::new(
            ConflictKind::BooleanMismatch,
            seen.iter().map(|b| Scalar::Bool(*b).to_string()).collect(),
        )),
    }
}

// ─── Numbers ───────────────────────────────────────────────

/// Largest numeric value, ignoring NaN and non-numbers. First wins ties.
pub fn max_numeric(values: &[&Value]) -> Value {
    let mut best: Option<&Scalar> = None;
    for scalar in values.iter().filter_map(|v| v.as_scalar()) {
        if scalar.as_f64().is_none_or(f64::is_nan) {
            continue;
        }
        let replaces = best.is_none_or(|current| {
            compare_numbers(scalar, current) == Some(Ordering::Greater)
        });
        if replaces {
            best = Some(scalar);
        }
    }
    best.map_or(Value::Absent, |scalar| Value::Scalar(scalar.clone()))
}

/// Integers compare exactly; a float on either side compares as `f64`.
fn compare_numbers(a: &Scalar, b: &Scalar) -> Option<Ordering> {
    match (a, b) {
        (Scalar::Int(x), Scalar::Int(y)) => Some(x.cmp(y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

// ─── Collections ───────────────────────────────────────────

/// Flatten all sequences and drop content duplicates, keeping the first
/// occurrence of each.
pub fn union_of_atoms(values: &[&Value]) -> Value {
    let items = values.iter().filter_map(|v| v.items()).flatten();
    Value::Sequence(dedup_items(items))
}

/// Like [`union_of_atoms`] but keeps only records; two records are the same
/// when their content matches, whatever order their keys arrived in.
pub fn union_of_structured_records(values: &[&Value]) -> Value {
    let records = values
        .iter()
        .filter_map(|v| v.items())
        .flatten()
        .filter(|item| item.as_record().is_some());
    Value::Sequence(dedup_items(records))
}

fn dedup_items<'a>(items: impl Iterator<Item = &'a Item>) -> Vec<Item> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        if seen.insert(item.canonical()) {
            unique.push(item.clone());
        }
    }
    unique
}

// ─── Fallback ──────────────────────────────────────────────

pub fn take_first(values: &[&Value]) -> Value {
    values.first().map_or(Value::Absent, |v| (*v).clone())
}

fn distinct_in_order<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<&'a Value> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(v.canonical())).collect()
}
