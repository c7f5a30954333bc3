use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Root configuration, loaded from `~/.config/prodmerge/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DedupConfig {
    pub merge: MergeSettings,
    /// `column = "policy-name"` overrides on top of the built-in registry.
    pub policies: BTreeMap<String, String>,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    pub key_column: String,
    pub key_separator: String,
    /// Separator inside multi-valued code cells such as `unspsc`.
    pub code_delimiter: String,
    pub domain_separator: String,
    /// Merge only rows whose key occurs more than once.
    pub duplicates_only: bool,
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Each pass lists the columns concatenated into its grouping key.
    pub passes: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub conflict_log: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            key_column: "key".to_string(),
            key_separator: "|".to_string(),
            code_delimiter: "|".to_string(),
            domain_separator: "|".to_string(),
            duplicates_only: false,
            parallel: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            passes: vec![
                vec!["page_url".to_string(), "product_title".to_string()],
                vec!["product_title".to_string(), "root_domain".to_string()],
            ],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("prodmerge");

        Self {
            conflict_log: data_dir
                .join("errors")
                .join("merge_errors.csv")
                .to_string_lossy()
                .to_string(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl DedupConfig {
    /// Standard config file path: `~/.config/prodmerge/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PRODMERGE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("prodmerge")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn conflict_log_path(&self) -> PathBuf {
        PathBuf::from(&self.output.conflict_log)
    }
}
