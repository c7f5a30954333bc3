pub mod config;
pub mod error;
pub mod inspect;
pub mod keys;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod storage;
pub mod table;
pub mod value;

pub use config::{DedupConfig, MergeSettings, OutputConfig, PipelineConfig};
pub use error::{DedupError, Result};
pub use table::{Row, Table};
pub use value::{Item, Record, Scalar, Value};

pub use inspect::{ColumnReport, inspect, render_report};
pub use keys::{build_key, split_duplicates};
pub use merge::{
    ColumnPlan, ConflictKind, ConflictRecord, ConflictSink, MergeConflict, MergeEngine,
    MergeOutcome, MergePolicy, PolicyRegistry,
};
pub use normalize::clean_columns;
pub use pipeline::{DedupPipeline, PassReport, PipelineReport};
pub use storage::{CsvConflictLog, ExportFormat, export_table, load_table};
