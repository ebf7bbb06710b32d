//! Compare module for dbdiff
//!
//! This module holds the leveled comparators, the engine driving them, and
//! the result model they produce.

pub mod engine;
pub mod level;
pub mod outcome;
pub mod sequence;
pub mod table;

// Re-export key types
pub use engine::ComparisonEngine;
pub use level::ComparisonLevel;
pub use outcome::{ComparisonEvent, ComparisonOutcome, MismatchDetail, ObjectKind, SkipReason};
pub use sequence::SequenceComparator;
pub use table::TableComparator;
