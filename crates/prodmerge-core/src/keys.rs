//! Grouping-key construction and the duplicate pre-filter.
//!
//! The merge engine only compares keys; deciding which columns identify a
//! product happens here, in the caller.

use std::collections::HashMap;

use crate::error::{DedupError, Result};
use crate::table::Table;
use crate::value::Value;

/// Add `key_column` as the `separator`-joined rendering of `sources`.
///
/// A row missing any source value gets an absent key, which the engine
/// never groups with other rows.
pub fn build_key(table: &mut Table, sources: &[String], separator: &str, key_column: &str) -> Result<()> {
    if sources.is_empty() {
        return Err(DedupError::Config("a key needs at least one source column".to_string()));
    }
    if let Some(missing) = sources.iter().find(|column| !table.has_column(column)) {
        return Err(DedupError::UnknownColumn(missing.clone()));
    }

    table.set_column_with(key_column, |row| {
        let mut parts = Vec::with_capacity(sources.len());
        for column in sources {
            let value = row.get(column);
            if value.is_absent() {
                return Value::Absent;
            }
            parts.push(value.to_string());
        }
        Value::str(parts.join(separator))
    });
    Ok(())
}

/// Split rows into those whose key occurs more than once and the rest,
/// preserving row order within each side. Absent keys count as unique.
pub fn split_duplicates(table: &Table, key_column: &str) -> Result<(Table, Table)> {
    if !table.has_column(key_column) {
        return Err(DedupError::MissingKeyColumn(key_column.to_string()));
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for key in table.column(key_column).filter(|key| !key.is_absent()) {
        *counts.entry(key.canonical()).or_default() += 1;
    }

    let mut duplicated = Table::with_columns(table.columns());
    let mut unique = Table::with_columns(table.columns());
    for row in table.rows() {
        let key = row.get(key_column);
        let repeated = !key.is_absent() && counts.get(&key.canonical()).is_some_and(|n| *n > 1);
        if repeated {
            duplicated.push_row(row.clone());
        } else {
            unique.push_row(row.clone());
        }
    }
    Ok((duplicated, unique))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;

    fn products() -> Table {
        let mut table = Table::with_columns(["page_url", "product_title", "root_domain"]);
        table.push_row(
            Row::new()
                .with("page_url", "a.com/p")
                .with("product_title", "Widget A")
                .with("root_domain", "a.com"),
        );
        table.push_row(
            Row::new()
                .with("page_url", "a.com/p")
                .with("product_title", "Widget A")
                .with("root_domain", "a.com"),
        );
        table.push_row(Row::new().with("page_url", "b.com/q"));
        table
    }

    fn sources(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_key_joins_sources() {
        let mut table = products();
        build_key(&mut table, &sources(&["root_domain", "product_title"]), "|", "key").unwrap();

        let keys: Vec<&Value> = table.column("key").collect();
        assert_eq!(keys[0], &Value::str("a.com|Widget A"));
        assert!(keys[2].is_absent());
        assert_eq!(table.columns().last().map(String::as_str), Some("key"));
    }

    #[test]
    fn test_build_key_rejects_unknown_source() {
        let mut table = products();
        let err = build_key(&mut table, &sources(&["sku"]), "|", "key").unwrap_err();
        assert!(matches!(err, DedupError::UnknownColumn(c) if c == "sku"));
    }

    #[test]
    fn test_split_duplicates() {
        let mut table = products();
        build_key(&mut table, &sources(&["page_url"]), "|", "key").unwrap();

        let (duplicated, unique) = split_duplicates(&table, "key").unwrap();
        assert_eq!(duplicated.len(), 2);
        assert_eq!(unique.len(), 1);
        assert_eq!(duplicated.columns(), table.columns());
    }

    #[test]
    fn test_split_duplicates_absent_keys_are_unique() {
        let mut table = products();
        build_key(&mut table, &sources(&["root_domain"]), "|", "key").unwrap();
        table.push_row(Row::new().with("page_url", "c.com/r"));

        let (duplicated, unique) = split_duplicates(&table, "key").unwrap();
        assert_eq!(duplicated.len(), 2);
        assert_eq!(unique.len(), 2);
    }
}
