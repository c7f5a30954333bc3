use serde::Serialize;
use tracing::info;

use crate::config::{DedupConfig, MergeSettings};
use crate::error::{DedupError, Result};
use crate::keys::{build_key, split_duplicates};
use crate::merge::{ConflictSink, MergeEngine, PolicyRegistry};
use crate::table::Table;

/// Counters for one merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub key_sources: Vec<String>,
    pub input_rows: usize,
    pub output_rows: usize,
    pub groups: usize,
    pub diverted: usize,
    pub diverted_rows: usize,
    /// Rows set aside by the duplicate pre-filter and re-appended unmerged.
    pub passthrough: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub passes: Vec<PassReport>,
}

impl PipelineReport {
    pub fn input_rows(&self) -> usize {
        self.passes.first().map_or(0, |p| p.input_rows)
    }

    pub fn output_rows(&self) -> usize {
        self.passes.last().map_or(0, |p| p.output_rows)
    }

    pub fn diverted(&self) -> usize {
        self.passes.iter().map(|p| p.diverted).sum()
    }

    pub fn diverted_rows(&self) -> usize {
        self.passes.iter().map(|p| p.diverted_rows).sum()
    }
}

/// Successive merge passes, each grouping on its own key.
///
/// Every pass builds a temporary key column, merges on it, sends diverted
/// groups to the conflict sink and drops the key before handing the merged
/// table to the next pass.
#[derive(Debug, Clone)]
pub struct DedupPipeline {
    engine: MergeEngine,
    passes: Vec<Vec<String>>,
    settings: MergeSettings,
}

impl DedupPipeline {
    pub fn new(engine: MergeEngine, passes: Vec<Vec<String>>, settings: MergeSettings) -> Self {
        Self {
            engine,
            passes,
            settings,
        }
    }

    pub fn from_config(config: &DedupConfig) -> Result<Self> {
        let registry = PolicyRegistry::from_config(config)?;
        Ok(Self::new(
            MergeEngine::new(registry),
            config.pipeline.passes.clone(),
            config.merge.clone(),
        ))
    }

    pub fn engine(&self) -> &MergeEngine {
        &self.engine
    }

    pub fn passes(&self) -> &[Vec<String>] {
        &self.passes
    }

    pub fn run(&self, table: Table, sink: &mut dyn ConflictSink) -> Result<(Table, PipelineReport)> {
        let mut report = PipelineReport::default();
        let mut current = table;
        for (idx, sources) in self.passes.iter().enumerate() {
            let (merged, pass) = self.run_pass(current, sources, sink)?;
            info!(
                pass = idx + 1,
                key = %sources.join("+"),
                input = pass.input_rows,
                output = pass.output_rows,
                diverted = pass.diverted,
                "merge pass finished"
            );
            report.passes.push(pass);
            current = merged;
        }
        Ok((current, report))
    }

    /// One pass keyed on `sources`, without the surrounding pass loop.
    pub fn run_pass(
        &self,
        mut table: Table,
        sources: &[String],
        sink: &mut dyn ConflictSink,
    ) -> Result<(Table, PassReport)> {
        let key_column = self.settings.key_column.as_str();
        if table.has_column(key_column) {
            return Err(DedupError::Config(format!(
                "input already has a '{key_column}' column; set merge.key_column to an unused name"
            )));
        }
        let input_rows = table.len();
        build_key(&mut table, sources, &self.settings.key_separator, key_column)?;

        let (to_merge, passthrough) = if self.settings.duplicates_only {
            let (duplicated, unique) = split_duplicates(&table, key_column)?;
            (duplicated, Some(unique))
        } else {
            (table, None)
        };

        let outcome = self
            .engine
            .merge_into(&to_merge, key_column, self.settings.parallel, sink)?;

        let mut merged = outcome.merged;
        let passthrough_rows = passthrough.as_ref().map_or(0, Table::len);
        if let Some(unique) = passthrough {
            merged.extend(unique);
        }
        merged.drop_columns(&[key_column]);

        let pass = PassReport {
            key_sources: sources.to_vec(),
            input_rows,
            output_rows: merged.len(),
            groups: outcome.groups,
            diverted: outcome.conflicts.len(),
            diverted_rows: outcome.conflicts.iter().map(|c| c.group_size).sum(),
            passthrough: passthrough_rows,
        };
        Ok((merged, pass))
    }
}
