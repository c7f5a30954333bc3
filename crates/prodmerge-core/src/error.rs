use thiserror::Error;

/// All structural errors that can occur in prodmerge-core.
///
/// Per-group data conflicts are not errors: they are diverted groups and
/// travel as [`crate::merge::ConflictRecord`]s instead.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Key column '{0}' not found in table")]
    MissingKeyColumn(String),

    #[error("Policy '{policy}' raised a conflict on column '{column}' but is not conflict-sensitive")]
    UndesignedConflict { column: String, policy: String },

    #[error("Unknown merge policy: {0}")]
    UnknownPolicy(String),

    #[error("Column not found: {0}")]
    UnknownColumn(String),

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Conflict log {path} cannot hold column '{column}'")]
    ConflictLogSchema { path: String, column: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, DedupError>;
