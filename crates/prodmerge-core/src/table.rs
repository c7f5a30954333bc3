use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use serde_json::Value as Json;

use crate::error::{DedupError, Result};
use crate::value::Value;

static ABSENT: Value = Value::Absent;

/// One product row. Columns the row does not carry read as [`Value::Absent`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> &Value {
        self.cells.get(column).unwrap_or(&ABSENT)
    }

    /// Store a cell. Setting [`Value::Absent`] clears it.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        match value.into() {
            Value::Absent => {
                self.cells.remove(&column);
            }
            value => {
                self.cells.insert(column, value);
            }
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn remove(&mut self, column: &str) -> Value {
        self.cells.remove(column).unwrap_or_default()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.cells.iter()
    }

    fn from_json_object(map: serde_json::Map<String, Json>) -> Self {
        Self {
            cells: map
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(column, value)| (column, Value::from(value)))
                .collect(),
        }
    }
}

/// An in-memory table: an ordered column schema plus rows.
///
/// Rows need not carry every column; the schema is the union of what the
/// rows carry, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for column in columns {
            table.register_column(column.into());
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Append a row, extending the schema with any columns it introduces.
    pub fn push_row(&mut self, row: Row) {
        for column in row.cells.keys() {
            if !self.has_column(column) {
                self.columns.push(column.clone());
            }
        }
        self.rows.push(row);
    }

    /// All values of one column, in row order.
    pub fn column<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |row| row.get(column))
    }

    /// Add (or replace) a column from a vector with one value per row.
    pub fn add_column(&mut self, column: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let column = column.into();
        if values.len() != self.rows.len() {
            return Err(DedupError::InvalidTable(format!(
                "column '{column}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.set(column.clone(), value);
        }
        self.register_column(column);
        Ok(())
    }

    /// Add (or replace) a column computed from each row.
    pub fn set_column_with<F>(&mut self, column: impl Into<String>, mut f: F)
    where
        F: FnMut(&Row) -> Value,
    {
        let column = column.into();
        for row in &mut self.rows {
            let value = f(row);
            row.set(column.clone(), value);
        }
        self.register_column(column);
    }

    pub fn drop_columns(&mut self, columns: &[&str]) {
        self.columns.retain(|c| !columns.contains(&c.as_str()));
        for row in &mut self.rows {
            for column in columns {
                row.remove(column);
            }
        }
    }

    /// Append every row of `other`, extending the schema as needed.
    pub fn extend(&mut self, other: Table) {
        for column in other.columns {
            self.register_column(column);
        }
        self.rows.extend(other.rows);
    }

    fn register_column(&mut self, column: String) {
        if !self.has_column(&column) {
            self.columns.push(column);
        }
    }

    // ─── JSON ──────────────────────────────────────────────

    /// Parse a JSON array of row objects.
    pub fn from_json_rows(text: &str) -> Result<Self> {
        let parsed: Json = serde_json::from_str(text)?;
        let Json::Array(elements) = parsed else {
            return Err(DedupError::InvalidTable(
                "expected a JSON array of row objects".to_string(),
            ));
        };

        let mut table = Self::new();
        for (idx, element) in elements.into_iter().enumerate() {
            table.push_json_row(element, idx)?;
        }
        Ok(table)
    }

    /// Parse JSON-lines: one row object per non-blank line.
    pub fn from_json_lines<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            table.push_json_row(serde_json::from_str(&line)?, idx)?;
        }
        Ok(table)
    }

    pub fn to_json_rows(&self) -> Json {
        Json::Array(self.rows.iter().map(|row| self.row_to_json(row)).collect())
    }

    pub fn write_json_lines<W: Write>(&self, mut writer: W) -> Result<()> {
        for row in &self.rows {
            serde_json::to_writer(&mut writer, &self.row_to_json(row))?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn push_json_row(&mut self, element: Json, idx: usize) -> Result<()> {
        let Json::Object(map) = element else {
            return Err(DedupError::InvalidTable(format!(
                "row {idx} is not a JSON object"
            )));
        };
        for column in map.keys() {
            if !self.has_column(column) {
                self.columns.push(column.clone());
            }
        }
        self.rows.push(Row::from_json_object(map));
        Ok(())
    }

    fn row_to_json(&self, row: &Row) -> Json {
        let mut map = serde_json::Map::with_capacity(self.columns.len());
        for column in &self.columns {
            map.insert(column.clone(), row.get(column).to_json());
        }
        Json::Object(map)
    }
}
