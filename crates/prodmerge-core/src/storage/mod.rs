pub mod conflict_log;
pub mod export;

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use crate::error::Result;
use crate::table::Table;

pub use conflict_log::CsvConflictLog;
pub use export::{ExportFormat, export_table};

/// Load a table from `.json` (array of row objects) or `.jsonl`/`.ndjson`
/// (one row object per line).
pub fn load_table(path: &Path) -> Result<Table> {
    let is_lines = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("ndjson"));

    if is_lines {
        Table::from_json_lines(BufReader::new(File::open(path)?))
    } else {
        Table::from_json_rows(&fs::read_to_string(path)?)
    }
}
