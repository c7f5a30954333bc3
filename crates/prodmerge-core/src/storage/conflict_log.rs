use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{DedupError, Result};
use crate::merge::{ConflictRecord, ConflictSink};

/// Columns written ahead of each diverted row's own columns.
pub const META_COLUMNS: [&str; 5] = [
    "error_message",
    "error_column",
    "group_size",
    "timestamp",
    "conflicting_values",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Append-only CSV log of diverted groups, one line per original row.
///
/// The header is written only when the file is created; later appends add
/// rows beneath it without rewriting anything, placing each cell under the
/// header column of the same name. A row carrying a column the header
/// lacks is refused before anything is written.
#[derive(Debug, Clone)]
pub struct CsvConflictLog {
    path: PathBuf,
}

impl CsvConflictLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CsvConflictLog {
    /// The header of an existing, non-empty log file.
    fn existing_header(&self) -> Result<Option<Vec<String>>> {
        if !self.path.exists() || fs::metadata(&self.path)?.len() == 0 {
            return Ok(None);
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;
        let mut header = csv::StringRecord::new();
        if !reader.read_record(&mut header)? {
            return Ok(None);
        }
        Ok(Some(header.iter().map(str::to_string).collect()))
    }

    fn schema_error(&self, column: &str) -> DedupError {
        DedupError::ConflictLogSchema {
            path: self.path.display().to_string(),
            column: column.to_string(),
        }
    }
}

impl ConflictSink for CsvConflictLog {
    fn append(&mut self, conflicts: &[ConflictRecord]) -> Result<()> {
        if conflicts.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Cells are placed by name under whatever header the file already has.
        let existing = self.existing_header()?;
        let row_columns = match &existing {
            Some(header) => {
                let meta_len = META_COLUMNS.len();
                if header.len() < meta_len || header[..meta_len] != META_COLUMNS {
                    let found = header.first().map_or("", String::as_str);
                    return Err(self.schema_error(found));
                }
                header[meta_len..].to_vec()
            }
            None => union_columns(conflicts),
        };

        for row in conflicts.iter().flat_map(|c| c.rows.iter()) {
            if let Some((column, _)) = row.iter().find(|(column, _)| !row_columns.contains(column)) {
                return Err(self.schema_error(column));
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if existing.is_none() {
            writer.write_record(
                META_COLUMNS
                    .iter()
                    .copied()
                    .chain(row_columns.iter().map(String::as_str)),
            )?;
        }

        for conflict in conflicts {
            let message = conflict.message();
            let group_size = conflict.group_size.to_string();
            let timestamp = conflict.timestamp.format(TIMESTAMP_FORMAT).to_string();
            let values = conflict.joined_values();

            for row in &conflict.rows {
                let mut record = vec![
                    message.clone(),
                    conflict.column.clone(),
                    group_size.clone(),
                    timestamp.clone(),
                    values.clone(),
                ];
                record.extend(row_columns.iter().map(|column| row.get(column).to_string()));
                writer.write_record(&record)?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}

/// Source columns across every conflict, in first-seen order.
fn union_columns(conflicts: &[ConflictRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for column in conflicts.iter().flat_map(|c| c.columns.iter()) {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    columns
}
