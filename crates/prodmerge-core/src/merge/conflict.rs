use chrono::{DateTime, Local};

use crate::error::Result;
use crate::table::Row;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Distinct non-empty values in a consistency-checked scalar column.
    ScalarMismatch,
    /// Both `true` and `false` in a consistency-checked flag column.
    BooleanMismatch,
}

/// A policy's refusal to merge: the distinct values it could not reconcile,
/// rendered in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    pub kind: ConflictKind,
    pub values: Vec<String>,
}

impl MergeConflict {
    pub fn new(kind: ConflictKind, values: Vec<String>) -> Self {
        Self { kind, values }
    }
}

/// A diverted group: the conflict that stopped it plus every original row.
#[derive(Debug, Clone)]
pub struct ConflictRecord {
    pub key: Value,
    pub column: String,
    pub kind: ConflictKind,
    pub conflicting_values: Vec<String>,
    pub group_size: usize,
    pub timestamp: DateTime<Local>,
    /// Column order of the table the rows came from.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ConflictRecord {
    pub fn message(&self) -> String {
        format!("Different {} values", self.column)
    }

    pub fn joined_values(&self) -> String {
        self.conflicting_values.join("|")
    }
}

/// Durable destination for diverted groups. Successive appends accumulate;
/// nothing is ever overwritten.
pub trait ConflictSink {
    fn append(&mut self, conflicts: &[ConflictRecord]) -> Result<()>;
}

impl ConflictSink for Vec<ConflictRecord> {
    fn append(&mut self, conflicts: &[ConflictRecord]) -> Result<()> {
        self.extend_from_slice(conflicts);
        Ok(())
    }
}
