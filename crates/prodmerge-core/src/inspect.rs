use std::fmt::Write;

use serde::Serialize;

use crate::table::Table;
use crate::value::{Item, Scalar, Value};

const PREVIEW_CHARS: usize = 40;

/// Per-column summary: how many rows carry a value, and what the first
/// such value looks like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnReport {
    pub index: usize,
    pub column: String,
    pub non_null: usize,
    pub kind: String,
    pub preview: String,
}

pub fn inspect(table: &Table) -> Vec<ColumnReport> {
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let non_null = table.column(column).filter(|v| !v.is_absent()).count();
            let sample = table.column(column).find(|v| !v.is_absent());
            ColumnReport {
                index,
                column: column.clone(),
                non_null,
                kind: sample.map_or_else(|| "NA".to_string(), value_kind),
                preview: sample.map_or_else(|| "NA".to_string(), preview),
            }
        })
        .collect()
}

/// Fixed-width text rendering of [`inspect`] output.
pub fn render_report(reports: &[ColumnReport]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Data columns (total {} columns):", reports.len());
    let _ = writeln!(out, " #   {:<36} {:>8}  {:<12} Preview", "Column", "Non-Null", "Kind");
    let _ = writeln!(out, "---  {} {} {} {}", "-".repeat(36), "-".repeat(8), "-".repeat(13), "-".repeat(43));
    for report in reports {
        let _ = writeln!(
            out,
            " {:<3} {:<36} {:>8}  {:<12} {}",
            report.index, report.column, report.non_null, report.kind, report.preview
        );
    }
    out
}

fn value_kind(value: &Value) -> String {
    match value {
        Value::Absent => "NA".to_string(),
        Value::Scalar(Scalar::Str(_)) => "str".to_string(),
        Value::Scalar(Scalar::Bool(_)) => "bool".to_string(),
        Value::Scalar(Scalar::Int(_)) => "int".to_string(),
        Value::Scalar(Scalar::Float(_)) => "float".to_string(),
        Value::Sequence(items) if items.iter().any(|i| matches!(i, Item::Record(_))) => {
            format!("records[{}]", items.len())
        }
        Value::Sequence(items) => format!("list[{}]", items.len()),
    }
}

fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text
    }
}
