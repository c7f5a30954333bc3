use std::collections::BTreeSet;
use std::fs;

use tempfile::TempDir;

use serde_json::json;

use prodmerge_core::{
    ConflictRecord, CsvConflictLog, DedupConfig, DedupPipeline, MergeEngine, MergeSettings, PolicyRegistry, Row,
    Table, Value, build_key, load_table,
};

fn engine() -> MergeEngine {
    MergeEngine::new(PolicyRegistry::builtin(&MergeSettings::default()))
}

fn read_log(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn eco_table() -> Table {
    let mut table = Table::with_columns(["root_domain", "product_title", "eco_friendly", "brand"]);
    for eco in [true, false, true] {
        table.push_row(
            Row::new()
                .with("root_domain", "acme.com")
                .with("product_title", "Widget A")
                .with("eco_friendly", eco)
                .with("brand", "Acme"),
        );
    }
    table.push_row(
        Row::new()
            .with("root_domain", "beta.com")
            .with("product_title", "Gizmo")
            .with("eco_friendly", true)
            .with("brand", "Beta"),
    );
    let sources = vec!["root_domain".to_string(), "product_title".to_string()];
    build_key(&mut table, &sources, "|", "key").unwrap();
    table
}

#[test]
fn eco_flag_conflict_is_diverted_and_logged() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("errors").join("merge_errors.csv");
    let mut log = CsvConflictLog::new(&log_path);

    let outcome = engine()
        .merge_into(&eco_table(), "key", false, &mut log)
        .unwrap();

    assert_eq!(outcome.merged.len(), 1);
    assert_eq!(outcome.merged.rows()[0].get("key"), &Value::str("beta.com|Gizmo"));

    assert_eq!(outcome.conflicts.len(), 1);
    let conflict = &outcome.conflicts[0];
    assert_eq!(conflict.key, Value::str("acme.com|Widget A"));
    assert_eq!(conflict.column, "eco_friendly");
    assert_eq!(conflict.group_size, 3);

    let lines = read_log(&log_path);
    assert_eq!(lines.len(), 4);
    for line in &lines[1..] {
        assert_eq!(line[0], "Different eco_friendly values");
        assert_eq!(line[1], "eco_friendly");
        assert_eq!(line[2], "3");
        let values: BTreeSet<&str> = line[4].split('|').collect();
        assert!(values.contains("True"));
        assert!(values.contains("False"));
    }
}

#[test]
fn every_input_key_lands_in_output_or_log() {
    let table = eco_table();
    let mut sink: Vec<ConflictRecord> = Vec::new();
    let outcome = engine().merge_into(&table, "key", false, &mut sink).unwrap();

    let input: BTreeSet<String> = table.column("key").map(Value::canonical).collect();
    let merged: BTreeSet<String> = outcome.merged.column("key").map(Value::canonical).collect();
    let diverted: BTreeSet<String> = sink.iter().map(|c| c.key.canonical()).collect();

    assert!(merged.is_disjoint(&diverted));
    let covered: BTreeSet<String> = merged.union(&diverted).cloned().collect();
    assert_eq!(covered, input);
    assert_eq!(outcome.groups, input.len());
}

#[test]
fn merging_merged_output_changes_nothing() {
    let table = Table::from_json_rows(
        r#"[
            {"key": "k1", "page_url": "https://a.com/p", "brand": "Acme",
             "materials": ["steel"], "price": [{"amount": 5, "currency": "USD"}],
             "unspsc": "1|2"},
            {"key": "k1", "page_url": "a.com/p", "brand": "Acme Corp",
             "materials": ["wood", "steel"], "price": {"currency": "USD", "amount": 5},
             "unspsc": "2|3", "manufacturing_year": 2021},
            {"key": "k2", "brand": "Beta", "eco_friendly": true}
        ]"#,
    )
    .unwrap();

    let once = engine().merge(&table, "key").unwrap();
    let twice = engine().merge(&once.merged, "key").unwrap();
    assert_eq!(once.merged, twice.merged);

    let row = &once.merged.rows()[0];
    assert_eq!(row.get("materials"), &Value::atoms(["steel", "wood"]));
    assert_eq!(row.get("price").items().map(<[_]>::len), Some(1));
    assert_eq!(row.get("unspsc"), &Value::str("1|2|3"));
}

#[test]
fn log_accumulates_across_calls() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("merge_errors.csv");

    for _ in 0..2 {
        let mut log = CsvConflictLog::new(&log_path);
        engine()
            .merge_into(&eco_table(), "key", false, &mut log)
            .unwrap();
    }

    let lines = read_log(&log_path);
    assert_eq!(lines.len(), 1 + 3 + 3);
    assert_eq!(lines.iter().filter(|l| l[0] == "error_message").count(), 1);
}

#[test]
fn config_file_overrides_reach_the_engine() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        "[policies]\nroot_domain = \"union-of-domains-string\"\n",
    )
    .unwrap();
    let config = DedupConfig::load_from(&config_path).unwrap();
    let registry = PolicyRegistry::from_config(&config).unwrap();

    let rows = dir.path().join("rows.jsonl");
    fs::write(
        &rows,
        "{\"key\": \"k\", \"root_domain\": \"b.com\"}\n{\"key\": \"k\", \"root_domain\": \"a.com\"}\n",
    )
    .unwrap();
    let table = load_table(&rows).unwrap();

    let outcome = MergeEngine::new(registry).merge(&table, "key").unwrap();
    assert!(outcome.conflicts.is_empty());
    assert_eq!(
        outcome.merged.rows()[0].get("root_domain"),
        &Value::str("a.com|b.com")
    );
}

#[test]
fn nested_price_records_survive_a_merge() {
    let table = Table::from_json_rows(
        r#"[
            {"key": "k", "brand": "Acme",
             "price": [{"amount": {"value": 5, "currency": "USD"}, "tiers": [[1, 2]]}]},
            {"key": "k", "brand": "Acme",
             "price": {"tiers": [[1, 2]], "amount": {"currency": "USD", "value": 5}}}
        ]"#,
    )
    .unwrap();

    let outcome = engine().merge(&table, "key").unwrap();
    assert!(outcome.conflicts.is_empty());
    assert_eq!(
        outcome.merged.rows()[0].get("price").to_json(),
        json!([{"amount": {"value": 5, "currency": "USD"}, "tiers": [[1, 2]]}])
    );
}

#[test]
fn two_pass_log_rows_line_up_under_their_headers() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("merge_errors.csv");

    let mut table = Table::with_columns(["page_url", "product_title", "root_domain", "brand", "eco_friendly"]);
    // Same page on two domains: diverted by the first pass.
    for domain in ["a.com", "b.com"] {
        table.push_row(
            Row::new()
                .with("page_url", "a.com/p1")
                .with("product_title", "Widget")
                .with("root_domain", domain)
                .with("brand", "Acme"),
        );
    }
    // Two pages of one product that disagree on the eco flag: diverted by the second pass.
    for (url, eco) in [("c.com/w1", true), ("c.com/w2", false)] {
        table.push_row(
            Row::new()
                .with("page_url", url)
                .with("product_title", "W")
                .with("root_domain", "c.com")
                .with("brand", "Zed")
                .with("eco_friendly", eco),
        );
    }

    let pipeline = DedupPipeline::from_config(&DedupConfig::default()).unwrap();
    let mut log = CsvConflictLog::new(&log_path);
    let (merged, report) = pipeline.run(table, &mut log).unwrap();
    assert_eq!(report.passes[0].diverted, 1);
    assert_eq!(report.passes[1].diverted, 1);
    assert!(merged.is_empty());

    let mut reader = csv::Reader::from_path(&log_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    let col = |name: &str| headers.iter().position(|h| h == name).unwrap();
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 4);

    let (first, second): (Vec<_>, Vec<_>) = records
        .iter()
        .partition(|r| &r[col("error_column")] == "root_domain");
    assert_eq!(first.len(), 2);
    for record in &first {
        assert_eq!(&record[col("key")], "a.com/p1|Widget");
        assert_eq!(&record[col("brand")], "Acme");
        assert_eq!(&record[col("eco_friendly")], "");
    }
    assert_eq!(second.len(), 2);
    for record in &second {
        assert_eq!(&record[col("error_column")], "eco_friendly");
        assert_eq!(&record[col("brand")], "Zed");
        assert_eq!(&record[col("root_domain")], "c.com");
        assert_eq!(&record[col("key")], "W|c.com");
        assert!(record[col("page_url")].starts_with("c.com/w"));
    }
}
