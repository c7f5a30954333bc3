pub mod conflict;
pub mod engine;
pub mod policies;
pub mod registry;

pub use conflict::{ConflictKind, ConflictRecord, ConflictSink, MergeConflict};
pub use engine::{MergeEngine, MergeOutcome};
pub use policies::MergePolicy;
pub use registry::{ColumnPlan, PolicyRegistry};
