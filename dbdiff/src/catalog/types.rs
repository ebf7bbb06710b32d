//! Type definitions for catalog objects

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Kind of constraint attached to a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    None,
    Check,
    Unique,
    ForeignKey,
    PrimaryKey,
}

impl ConstraintKind {
    /// Map an `information_schema.table_constraints.constraint_type` value
    pub fn from_catalog(constraint_type: &str) -> Self {
        match constraint_type.to_uppercase().as_str() {
            "PRIMARY KEY" => ConstraintKind::PrimaryKey,
            "FOREIGN KEY" => ConstraintKind::ForeignKey,
            "UNIQUE" => ConstraintKind::Unique,
            "CHECK" => ConstraintKind::Check,
            _ => ConstraintKind::None,
        }
    }

    /// Keep the stronger of two kinds, ranked by declaration order
    pub fn strongest(self, other: ConstraintKind) -> ConstraintKind {
        self.max(other)
    }
}

impl Default for ConstraintKind {
    fn default() -> Self {
        ConstraintKind::None
    }
}

/// Represents a database column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub constraint: ConstraintKind,
}

impl Column {
    /// Create a new column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: false,
            default: None,
            constraint: ConstraintKind::None,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set a default value for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Set the column's constraint kind
    pub fn constraint(mut self, constraint: ConstraintKind) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn is_primary(&self) -> bool {
        self.constraint == ConstraintKind::PrimaryKey
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Columns in declared order
    pub columns: IndexMap<String, Column>,
    pub primary_key: Option<String>,
    pub row_count: u64,
}

impl Table {
    /// Create a new empty table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: IndexMap::new(),
            primary_key: None,
            row_count: 0,
        }
    }

    /// Add a column; a primary-key column becomes the table's key
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if column.is_primary() {
            match &self.primary_key {
                Some(existing) if existing != &column.name => {
                    return Err(Error::ValidationError(format!(
                        "table '{}' already has primary key '{}', composite keys are not supported",
                        self.name, existing
                    )));
                }
                _ => self.primary_key = Some(column.name.clone()),
            }
        }
        self.columns.insert(column.name.clone(), column);
        Ok(())
    }

    /// Builder-style variant of [`Table::add_column`]
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        self.add_column(column)?;
        Ok(self)
    }

    pub fn primary_key_column(&self) -> Option<&Column> {
        self.primary_key
            .as_ref()
            .and_then(|name| self.columns.get(name))
    }

    /// Position of a column in declared order
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(name)
    }
}

/// Definition of a sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDescriptor {
    pub last_value: i64,
    pub start_value: i64,
    pub increment_by: i64,
    pub max_value: i64,
    pub min_value: i64,
    pub precision: i64,
    pub data_type: String,
}

/// The sole primary-key column of a table as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    pub name: String,
    /// Backend type name used to cast bound key values
    pub sql_type: String,
}

/// A primary-key value, rendered as text by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValue(pub String);

impl KeyValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue(value.to_string())
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue(value.to_string())
    }
}

/// Column values of one row in declared column order, `None` for NULL
pub type Row = Vec<Option<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strongest_constraint_prefers_primary_key() {
        assert_eq!(
            ConstraintKind::Unique.strongest(ConstraintKind::PrimaryKey),
            ConstraintKind::PrimaryKey
        );
        assert_eq!(
            ConstraintKind::ForeignKey.strongest(ConstraintKind::Check),
            ConstraintKind::ForeignKey
        );
        assert_eq!(ConstraintKind::from_catalog("foreign key"), ConstraintKind::ForeignKey);
        assert_eq!(ConstraintKind::from_catalog("EXCLUDE"), ConstraintKind::None);
    }

    #[test]
    fn table_rejects_second_primary_key() {
        let mut table = Table::new("orders");
        table
            .add_column(Column::new("id", "integer").constraint(ConstraintKind::PrimaryKey))
            .unwrap();
        let err = table
            .add_column(Column::new("code", "text").constraint(ConstraintKind::PrimaryKey))
            .unwrap_err();

        assert!(matches!(err, Error::ValidationError(_)));
        assert_eq!(table.primary_key.as_deref(), Some("id"));
        assert_eq!(table.primary_key_column().map(|c| c.data_type.as_str()), Some("integer"));
    }
}
