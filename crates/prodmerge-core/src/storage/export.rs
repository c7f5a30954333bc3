use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::error::{DedupError, Result};
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    JsonLines,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::JsonLines => "jsonl",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" | "ndjson" => Ok(ExportFormat::JsonLines),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(DedupError::Config(format!(
                "export format must be json, jsonl or csv, got '{other}'"
            ))),
        }
    }
}

/// Write `table` to `{dir}/{name}.{ext}`, creating `dir` if needed.
pub fn export_table(table: &Table, dir: &Path, name: &str, format: ExportFormat) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{name}.{}", format.extension()));
    let mut writer = BufWriter::new(File::create(&path)?);

    match format {
        ExportFormat::Json => serde_json::to_writer_pretty(&mut writer, &table.to_json_rows())?,
        ExportFormat::JsonLines => table.write_json_lines(&mut writer)?,
        ExportFormat::Csv => write_csv(table, &mut writer)?,
    }
    writer.flush()?;

    info!(path = %path.display(), rows = table.len(), "exported table");
    Ok(path)
}

fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.columns())?;
    for row in table.rows() {
        csv_writer.write_record(table.columns().iter().map(|c| row.get(c).to_string()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::storage::load_table;
    use crate::table::Row;
    use crate::value::Value;

    fn sample() -> Table {
        let mut table = Table::with_columns(["page_url", "materials", "eco_friendly"]);
        table.push_row(
            Row::new()
                .with("page_url", "a.com/p")
                .with("materials", Value::atoms(["steel", "wood"]))
                .with("eco_friendly", true),
        );
        table
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("ndjson".parse::<ExportFormat>().unwrap(), ExportFormat::JsonLines);
        assert!("parquet".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_json_export_reloads() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("final");

        for format in [ExportFormat::Json, ExportFormat::JsonLines] {
            let path = export_table(&sample(), &out, "final_data", format).unwrap();
            assert_eq!(path.extension().unwrap(), format.extension());
            assert_eq!(load_table(&path).unwrap(), sample());
        }
    }

    #[test]
    fn test_csv_export_renders_cells() {
        let dir = TempDir::new().unwrap();
        let path = export_table(&sample(), dir.path(), "final_data", ExportFormat::Csv).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("page_url,materials,eco_friendly"));
        assert_eq!(lines.next(), Some(r#"a.com/p,"[""steel"",""wood""]",True"#));
    }
}
