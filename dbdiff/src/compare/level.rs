//! Comparison levels

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// How deep a comparison goes, each level implying all shallower ones
///
/// Levels 0–1 are single metadata queries, 2–3 are schema introspection,
/// 4 scans key values and 5 fetches every row. Sequences only know levels 0
/// and 1, where level 1 compares the sequence definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ComparisonLevel {
    /// The object exists in the target
    Existence = 0,
    /// Row counts (tables) or definitions (sequences) agree
    Cardinality = 1,
    /// Column definitions agree
    Columns = 2,
    /// Primary-key column agrees
    PrimaryKey = 3,
    /// Every source key value exists in the target
    KeyValues = 4,
    /// Every row matches its counterpart with the same key
    RowContent = 5,
}

impl ComparisonLevel {
    pub const ALL: [ComparisonLevel; 6] = [
        ComparisonLevel::Existence,
        ComparisonLevel::Cardinality,
        ComparisonLevel::Columns,
        ComparisonLevel::PrimaryKey,
        ComparisonLevel::KeyValues,
        ComparisonLevel::RowContent,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// True when a comparison capped at `max` evaluates this level
    pub fn within(self, max: ComparisonLevel) -> bool {
        self <= max
    }

    pub fn description(self) -> &'static str {
        match self {
            ComparisonLevel::Existence => "existence",
            ComparisonLevel::Cardinality => "records count",
            ComparisonLevel::Columns => "column description",
            ComparisonLevel::PrimaryKey => "primary key",
            ComparisonLevel::KeyValues => "primary key values",
            ComparisonLevel::RowContent => "record data",
        }
    }
}

impl Default for ComparisonLevel {
    fn default() -> Self {
        ComparisonLevel::Existence
    }
}

impl From<ComparisonLevel> for u8 {
    fn from(level: ComparisonLevel) -> Self {
        level.ordinal()
    }
}

impl TryFrom<u8> for ComparisonLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ComparisonLevel::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| {
                Error::ConfigError(format!(
                    "comparison level must be an integer in [0,5], got {}",
                    value
                ))
            })
    }
}

impl fmt::Display for ComparisonLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.ordinal(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_round_trip_through_ordinals() {
        for level in ComparisonLevel::ALL {
            assert_eq!(ComparisonLevel::try_from(level.ordinal()).unwrap(), level);
        }
        assert!(ComparisonLevel::try_from(6).is_err());
    }

    #[test]
    fn levels_are_ordered_by_cost() {
        assert!(ComparisonLevel::Columns.within(ComparisonLevel::RowContent));
        assert!(!ComparisonLevel::KeyValues.within(ComparisonLevel::PrimaryKey));
    }
}
