//! Result model of a comparison run

use serde::{Deserialize, Serialize};

use crate::catalog::types::{Column, KeyValue, Row, SequenceDescriptor};
use crate::compare::level::ComparisonLevel;

/// What a [`ComparisonEvent`] is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectKind {
    Sequence,
    Table,
    /// One row of a table, identified by its primary-key value
    Record { key: KeyValue },
}

/// The two values compared at the level that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum MismatchDetail {
    RowCount {
        source: u64,
        target: u64,
        /// Rows missing from the target, negative when the target has more
        delta: i64,
    },
    Columns {
        source: Vec<Column>,
        target: Vec<Column>,
    },
    PrimaryKey {
        source: Option<String>,
        target: Option<String>,
    },
    Row {
        source: Row,
        target: Row,
    },
    Sequence {
        source: SequenceDescriptor,
        target: SequenceDescriptor,
    },
}

impl MismatchDetail {
    pub fn row_count(source: u64, target: u64) -> Self {
        MismatchDetail::RowCount {
            source,
            target,
            delta: source as i64 - target as i64,
        }
    }
}

/// Why deeper levels were not evaluated for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoPrimaryKey,
}

/// Outcome of comparing one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    /// Every requested level passed
    Match,
    MissingInTarget,
    Mismatch {
        level: ComparisonLevel,
        detail: MismatchDetail,
    },
    /// Levels from `level` on could not be evaluated
    Skipped {
        level: ComparisonLevel,
        reason: SkipReason,
    },
    /// The object could not be compared
    Error { detail: String },
}

impl ComparisonOutcome {
    pub fn mismatch(level: ComparisonLevel, detail: MismatchDetail) -> Self {
        ComparisonOutcome::Mismatch { level, detail }
    }

    pub fn error(err: impl ToString) -> Self {
        ComparisonOutcome::Error {
            detail: err.to_string(),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, ComparisonOutcome::Match)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ComparisonOutcome::Error { .. })
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            ComparisonOutcome::Match => "match",
            ComparisonOutcome::MissingInTarget => "missing_in_target",
            ComparisonOutcome::Mismatch { .. } => "mismatch",
            ComparisonOutcome::Skipped { .. } => "skipped",
            ComparisonOutcome::Error { .. } => "error",
        }
    }

    /// Level at which a mismatch was found
    pub fn mismatch_level(&self) -> Option<ComparisonLevel> {
        match self {
            ComparisonOutcome::Mismatch { level, .. } => Some(*level),
            ComparisonOutcome::MissingInTarget => Some(ComparisonLevel::Existence),
            _ => None,
        }
    }
}

/// One item of the result stream: `(kind, name, outcome)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonEvent {
    #[serde(flatten)]
    pub kind: ObjectKind,
    /// Sequence or table name; for records, the owning table
    pub name: String,
    pub outcome: ComparisonOutcome,
}

impl ComparisonEvent {
    pub fn sequence(name: &str, outcome: ComparisonOutcome) -> Self {
        Self {
            kind: ObjectKind::Sequence,
            name: name.to_string(),
            outcome,
        }
    }

    pub fn table(name: &str, outcome: ComparisonOutcome) -> Self {
        Self {
            kind: ObjectKind::Table,
            name: name.to_string(),
            outcome,
        }
    }

    pub fn record(table: &str, key: KeyValue, outcome: ComparisonOutcome) -> Self {
        Self {
            kind: ObjectKind::Record { key },
            name: table.to_string(),
            outcome,
        }
    }
}
