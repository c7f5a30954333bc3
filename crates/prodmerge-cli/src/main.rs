mod telemetry;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use prodmerge_core::{
    CsvConflictLog, DedupConfig, DedupError, DedupPipeline, ExportFormat,
    PolicyRegistry, Table, clean_columns, export_table, inspect, load_table, render_report,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "prodmerge",
    about = "Collapse duplicate product rows into one row per product",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting PRODMERGE_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of the standard location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean columns, run every configured merge pass and export the result.
    Run {
        /// Rows as a JSON array (.json) or JSON lines (.jsonl, .ndjson).
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
        /// Skip column pre-normalisation.
        #[arg(long)]
        no_clean: bool,
    },

    /// Run a single merge pass keyed on the given columns.
    Merge {
        input: PathBuf,
        /// Comma-separated source columns of the grouping key.
        #[arg(long, value_delimiter = ',', required = true)]
        key: Vec<String>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print per-column counts, value kinds and previews.
    Inspect { input: PathBuf },

    /// Print the effective column → policy registry.
    Policies,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// json, jsonl or csv.
    #[arg(long, default_value = "json")]
    format: String,
    /// Merge only rows whose key occurs more than once.
    #[arg(long)]
    duplicates_only: bool,
    /// Merge groups on all cores.
    #[arg(long)]
    parallel: bool,
    /// Append diverted groups here instead of the configured log.
    #[arg(long)]
    conflict_log: Option<PathBuf>,
    /// Exit with a distinct status when any group was diverted.
    #[arg(long)]
    fail_on_conflict: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path.
    Path,
    /// Print the effective config as TOML.
    Show,
}

// ─── Exit codes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    Error = 1,
    InvalidArgs = 2,
    Io = 3,
    Conflicts = 4,
}

impl ExitCode {
    fn classify(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<DedupError>() {
            Some(
                DedupError::MissingKeyColumn(_)
                | DedupError::UnknownColumn(_)
                | DedupError::UnknownPolicy(_)
                | DedupError::Config(_),
            ) => ExitCode::InvalidArgs,
            Some(DedupError::Io(_)) => ExitCode::Io,
            Some(_) => ExitCode::Error,
            None if err.downcast_ref::<std::io::Error>().is_some() => ExitCode::Io,
            None => ExitCode::Error,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() -> std::process::ExitCode {
    telemetry::init();
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("PRODMERGE_JSON").as_deref() == Ok("1");

    match run(cli, json_output) {
        Ok(code) => code.into(),
        Err(err) => {
            let code = ExitCode::classify(&err);
            if json_output {
                let _ = print_json(&serde_json::json!({
                    "status": "error",
                    "error": format!("{code:?}").to_lowercase(),
                    "message": format!("{err:#}"),
                }));
            } else {
                eprintln!("error: {err:#}");
            }
            code.into()
        }
    }
}

fn run(cli: Cli, json_output: bool) -> Result<ExitCode> {
    let start = Instant::now();
    let config_path = cli.config.clone().unwrap_or_else(DedupConfig::config_path);
    let mut config = DedupConfig::load_from(&config_path)?;

    match cli.command {
        Commands::Run {
            input,
            output,
            no_clean,
        } => {
            output.apply(&mut config);
            let mut table = load_table(&input)?;
            info!(input = %input.display(), rows = table.len(), "loaded table");
            if !no_clean {
                clean_columns(&mut table);
            }

            let pipeline = DedupPipeline::from_config(&config)?;
            let mut log = CsvConflictLog::new(config.conflict_log_path());
            let (merged, report) = pipeline.run(table, &mut log)?;
            let path = output.export(&merged, "final_data")?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": {
                        "output": path,
                        "conflict_log": log.path(),
                        "input_rows": report.input_rows(),
                        "output_rows": report.output_rows(),
                        "diverted_groups": report.diverted(),
                        "diverted_rows": report.diverted_rows(),
                        "passes": &report.passes,
                    },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                for (idx, pass) in report.passes.iter().enumerate() {
                    println!(
                        "pass {} [{}]: {} → {} rows, {} groups, {} diverted",
                        idx + 1,
                        pass.key_sources.join(", "),
                        pass.input_rows,
                        pass.output_rows,
                        pass.groups,
                        pass.diverted
                    );
                }
                println!("Wrote {} rows to {}", merged.len(), path.display());
                if report.diverted() > 0 {
                    println!(
                        "{} groups ({} rows) logged to {}",
                        report.diverted(),
                        report.diverted_rows(),
                        log.path().display()
                    );
                }
            }
            Ok(output.exit_code(report.diverted()))
        }

        Commands::Merge { input, key, output } => {
            output.apply(&mut config);
            let table = load_table(&input)?;
            info!(input = %input.display(), rows = table.len(), "loaded table");

            let pipeline = DedupPipeline::from_config(&config)?;
            let mut log = CsvConflictLog::new(config.conflict_log_path());
            let (merged, pass) = pipeline.run_pass(table, &key, &mut log)?;
            let path = output.export(&merged, "merged_data")?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "output": path, "conflict_log": log.path(), "pass": &pass },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!(
                    "{} → {} rows, {} groups, {} diverted",
                    pass.input_rows, pass.output_rows, pass.groups, pass.diverted
                );
                println!("Wrote {}", path.display());
            }
            Ok(output.exit_code(pass.diverted))
        }

        Commands::Inspect { input } => {
            let table = load_table(&input)?;
            let reports = inspect(&table);
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "rows": table.len(), "columns": reports },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!("{} rows", table.len());
                print!("{}", render_report(&reports));
            }
            Ok(ExitCode::Success)
        }

        Commands::Policies => {
            let registry = PolicyRegistry::from_config(&config)?;
            if json_output {
                let items: Vec<_> = registry
                    .iter()
                    .map(|(column, policy)| {
                        serde_json::json!({
                            "column": column,
                            "policy": policy.name(),
                            "conflict_sensitive": policy.is_conflict_sensitive(),
                        })
                    })
                    .collect();
                print_json(&serde_json::json!({ "status": "ok", "data": { "items": items } }))?;
            } else {
                for (column, policy) in registry.iter() {
                    let marker = if policy.is_conflict_sensitive() { "  (diverts)" } else { "" };
                    println!("{column:<40} {policy}{marker}");
                }
            }
            Ok(ExitCode::Success)
        }

        Commands::Config { action } => {
            match action {
                ConfigAction::Path => {
                    if json_output {
                        print_json(&serde_json::json!({
                            "status": "ok",
                            "data": { "path": config_path, "exists": config_path.exists() }
                        }))?;
                    } else {
                        println!("{}", config_path.display());
                    }
                }
                ConfigAction::Show => {
                    if json_output {
                        print_json(&serde_json::json!({ "status": "ok", "data": config }))?;
                    } else {
                        print!("{}", toml::to_string_pretty(&config)?);
                    }
                }
            }
            Ok(ExitCode::Success)
        }
    }
}

impl OutputArgs {
    fn apply(&self, config: &mut DedupConfig) {
        if self.duplicates_only {
            config.merge.duplicates_only = true;
        }
        if self.parallel {
            config.merge.parallel = true;
        }
        if let Some(path) = &self.conflict_log {
            config.output.conflict_log = path.to_string_lossy().to_string();
        }
    }

    fn export(&self, table: &Table, name: &str) -> Result<PathBuf> {
        let format: ExportFormat = self.format.parse()?;
        Ok(export_table(table, Path::new(&self.output_dir), name, format)?)
    }

    fn exit_code(&self, diverted: usize) -> ExitCode {
        if self.fail_on_conflict && diverted > 0 {
            ExitCode::Conflicts
        } else {
            ExitCode::Success
        }
    }
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}
