use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::error::{DedupError, Result};
use crate::merge::conflict::{ConflictRecord, ConflictSink};
use crate::merge::registry::{ColumnPlan, PolicyRegistry};
use crate::table::{Row, Table};
use crate::value::Value;

/// Result of one merge call.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// One row per group that merged cleanly, in first-seen key order.
    pub merged: Table,
    /// One record per diverted group, in first-seen key order.
    pub conflicts: Vec<ConflictRecord>,
    pub groups: usize,
}

impl MergeOutcome {
    pub fn diverted(&self) -> usize {
        self.conflicts.len()
    }

    pub fn diverted_rows(&self) -> usize {
        self.conflicts.iter().map(|c| c.group_size).sum()
    }
}

enum GroupOutcome {
    Merged(Row),
    Diverted(ConflictRecord),
}

/// Groups rows by exact key equality and collapses each group into one row
/// using the registry's per-column policies.
///
/// A group whose conflict-sensitive column cannot be reconciled is diverted
/// whole: no partial row is produced, and its original rows travel in the
/// [`ConflictRecord`]. Rows with an absent key are never grouped together;
/// each passes through as its own group.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    registry: PolicyRegistry,
}

impl MergeEngine {
    pub fn new(registry: PolicyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    pub fn merge(&self, table: &Table, key_column: &str) -> Result<MergeOutcome> {
        check_key_column(table, key_column)?;
        if table.is_empty() {
            return Ok(unchanged(table));
        }

        let plan = self.registry.plan(table.columns(), key_column);
        let groups = partition(table, key_column);
        let outcomes = groups
            .iter()
            .map(|rows| merge_group(&plan, key_column, table.columns(), rows))
            .collect::<Result<Vec<_>>>()?;

        Ok(assemble(key_column, &plan, outcomes))
    }

    /// Same contract and output as [`MergeEngine::merge`], with groups
    /// merged on the rayon pool. Conflicts are gathered per group and
    /// concatenated afterwards in group order.
    #[cfg(feature = "parallel")]
    pub fn merge_parallel(&self, table: &Table, key_column: &str) -> Result<MergeOutcome> {
        use rayon::prelude::*;

        check_key_column(table, key_column)?;
        if table.is_empty() {
            return Ok(unchanged(table));
        }

        let plan = self.registry.plan(table.columns(), key_column);
        let groups = partition(table, key_column);
        let outcomes = groups
            .par_iter()
            .map(|rows| merge_group(&plan, key_column, table.columns(), rows))
            .collect::<Result<Vec<_>>>()?;

        Ok(assemble(key_column, &plan, outcomes))
    }

    /// Merge, then append any diverted groups to `sink`.
    pub fn merge_into(
        &self,
        table: &Table,
        key_column: &str,
        parallel: bool,
        sink: &mut dyn ConflictSink,
    ) -> Result<MergeOutcome> {
        let outcome = if parallel {
            self.merge_maybe_parallel(table, key_column)?
        } else {
            self.merge(table, key_column)?
        };

        if !outcome.conflicts.is_empty() {
            warn!(
                diverted = outcome.diverted(),
                "found {} groups with merge conflicts",
                outcome.diverted()
            );
            sink.append(&outcome.conflicts)?;
            info!(
                rows = outcome.diverted_rows(),
                "logged {} rows with merge errors",
                outcome.diverted_rows()
            );
        }
        Ok(outcome)
    }

    #[cfg(feature = "parallel")]
    fn merge_maybe_parallel(&self, table: &Table, key_column: &str) -> Result<MergeOutcome> {
        self.merge_parallel(table, key_column)
    }

    #[cfg(not(feature = "parallel"))]
    fn merge_maybe_parallel(&self, table: &Table, key_column: &str) -> Result<MergeOutcome> {
        warn!("parallel merge requested but prodmerge-core was built without 'parallel'");
        self.merge(table, key_column)
    }
}

fn check_key_column(table: &Table, key_column: &str) -> Result<()> {
    if table.has_column(key_column) {
        Ok(())
    } else {
        Err(DedupError::MissingKeyColumn(key_column.to_string()))
    }
}

fn unchanged(table: &Table) -> MergeOutcome {
    MergeOutcome {
        merged: table.clone(),
        conflicts: Vec::new(),
        groups: 0,
    }
}

/// Rows grouped by exact key equality, groups in first-seen order.
fn partition<'a>(table: &'a Table, key_column: &str) -> Vec<Vec<&'a Row>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Row>> = Vec::new();

    for row in table.rows() {
        let key = row.get(key_column);
        if key.is_absent() {
            groups.push(vec![row]);
            continue;
        }
        match index.entry(key.canonical()) {
            Entry::Occupied(slot) => groups[*slot.get()].push(row),
            Entry::Vacant(slot) => {
                slot.insert(groups.len());
                groups.push(vec![row]);
            }
        }
    }
    groups
}

fn merge_group(
    plan: &[ColumnPlan],
    key_column: &str,
    columns: &[String],
    rows: &[&Row],
) -> Result<GroupOutcome> {
    let key = rows
        .first()
        .map(|row| row.get(key_column).clone())
        .unwrap_or_default();

    let mut merged = Row::new();
    merged.set(key_column, key.clone());

    let mut values: Vec<&Value> = Vec::with_capacity(rows.len());
    for ColumnPlan { column, policy } in plan {
        values.clear();
        values.extend(rows.iter().map(|row| row.get(column)));

        match policy.apply(&values) {
            Ok(Value::Absent) if policy.is_collection() => {
                merged.set(column.clone(), Value::empty_sequence());
            }
            Ok(value) => merged.set(column.clone(), value),
            Err(conflict) if policy.is_conflict_sensitive() => {
                debug!(key = %key, column = %column, "diverting group");
                return Ok(GroupOutcome::Diverted(ConflictRecord {
                    key,
                    column: column.clone(),
                    kind: conflict.kind,
                    conflicting_values: conflict.values,
                    group_size: rows.len(),
                    timestamp: Local::now(),
                    columns: columns.to_vec(),
                    rows: rows.iter().map(|row| (*row).clone()).collect(),
                }));
            }
            Err(_) => {
                return Err(DedupError::UndesignedConflict {
                    column: column.clone(),
                    policy: policy.name().to_string(),
                });
            }
        }
    }
    Ok(GroupOutcome::Merged(merged))
}

fn assemble(key_column: &str, plan: &[ColumnPlan], outcomes: Vec<GroupOutcome>) -> MergeOutcome {
    let columns = std::iter::once(key_column).chain(plan.iter().map(|p| p.column.as_str()));
    let mut merged = Table::with_columns(columns);
    let mut conflicts = Vec::new();
    let groups = outcomes.len();

    for outcome in outcomes {
        match outcome {
            GroupOutcome::Merged(row) => merged.push_row(row),
            GroupOutcome::Diverted(conflict) => conflicts.push(conflict),
        }
    }

    MergeOutcome {
        merged,
        conflicts,
        groups,
    }
}
