//! In-memory catalog backend
//!
//! Holds tables, rows and sequences in memory and counts every backend call,
//! so the comparison engine can be exercised without a database.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::catalog::types::{Column, KeyColumn, KeyValue, Row, SequenceDescriptor, Table};
use crate::catalog::CatalogBackend;
use crate::error::{Error, Result};

/// A table definition together with its rows
#[derive(Debug, Clone)]
pub struct TableFixture {
    pub table: Table,
    /// Rows in declared column order
    pub rows: Vec<Row>,
}

impl TableFixture {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    /// Rows built from borrowed literals; every value is non-NULL
    pub fn with_rows(mut self, rows: &[&[&str]]) -> Self {
        for row in rows {
            self.rows
                .push(row.iter().map(|v| Some((*v).to_string())).collect());
        }
        self
    }
}

/// Snapshot of how often each backend operation ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub table_names: usize,
    pub sequence_names: usize,
    pub primary_keys: usize,
    pub row_count: usize,
    pub columns: usize,
    pub key_values: usize,
    pub rows: usize,
    pub sequences: usize,
}

impl CallCounts {
    /// Calls that read a table's data or schema, beyond its name
    pub fn table_queries(&self) -> usize {
        self.row_count + self.columns + self.key_values + self.rows
    }
}

/// Live counters shared between a backend and its observers
#[derive(Debug, Default)]
pub struct CallLog {
    table_names: AtomicUsize,
    sequence_names: AtomicUsize,
    primary_keys: AtomicUsize,
    row_count: AtomicUsize,
    columns: AtomicUsize,
    key_values: AtomicUsize,
    rows: AtomicUsize,
    sequences: AtomicUsize,
}

impl CallLog {
    pub fn snapshot(&self) -> CallCounts {
        CallCounts {
            table_names: self.table_names.load(Ordering::SeqCst),
            sequence_names: self.sequence_names.load(Ordering::SeqCst),
            primary_keys: self.primary_keys.load(Ordering::SeqCst),
            row_count: self.row_count.load(Ordering::SeqCst),
            columns: self.columns.load(Ordering::SeqCst),
            key_values: self.key_values.load(Ordering::SeqCst),
            rows: self.rows.load(Ordering::SeqCst),
            sequences: self.sequences.load(Ordering::SeqCst),
        }
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`CatalogBackend`] backed by fixtures
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: IndexMap<String, TableFixture>,
    sequences: BTreeMap<String, SequenceDescriptor>,
    failing: HashSet<String>,
    calls: Arc<CallLog>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, fixture: TableFixture) -> Self {
        self.tables.insert(fixture.table.name.clone(), fixture);
        self
    }

    pub fn with_sequence(mut self, name: &str, descriptor: SequenceDescriptor) -> Self {
        self.sequences.insert(name.to_string(), descriptor);
        self
    }

    /// Make every data query against `table` fail as a backend error
    pub fn with_failing_table(mut self, table: &str) -> Self {
        self.failing.insert(table.to_string());
        self
    }

    /// Handle to the call counters, still valid after the backend is moved
    pub fn calls(&self) -> Arc<CallLog> {
        Arc::clone(&self.calls)
    }

    fn fixture(&self, table: &str) -> Result<&TableFixture> {
        if self.failing.contains(table) {
            return Err(Error::DatabaseError(format!(
                "simulated failure reading '{}'",
                table
            )));
        }
        self.tables
            .get(table)
            .ok_or_else(|| Error::NotFound(format!("table '{}'", table)))
    }

    fn key_index(fixture: &TableFixture, key: &KeyColumn) -> Result<usize> {
        fixture.table.column_index(&key.name).ok_or_else(|| {
            Error::DatabaseError(format!(
                "key column '{}' missing from '{}'",
                key.name, fixture.table.name
            ))
        })
    }
}

#[async_trait]
impl CatalogBackend for InMemoryBackend {
    fn driver(&self) -> &str {
        "memory"
    }

    async fn fetch_table_names(&self) -> Result<Vec<String>> {
        CallLog::bump(&self.calls.table_names);
        Ok(self.tables.keys().cloned().collect())
    }

    async fn fetch_sequence_names(&self) -> Result<Vec<String>> {
        CallLog::bump(&self.calls.sequence_names);
        Ok(self.sequences.keys().cloned().collect())
    }

    async fn fetch_primary_keys(&self) -> Result<Vec<(String, KeyColumn)>> {
        CallLog::bump(&self.calls.primary_keys);
        Ok(self
            .tables
            .values()
            .filter_map(|fixture| {
                fixture.table.primary_key_column().map(|column| {
                    (
                        fixture.table.name.clone(),
                        KeyColumn {
                            name: column.name.clone(),
                            sql_type: column.data_type.clone(),
                        },
                    )
                })
            })
            .collect())
    }

    async fn fetch_row_count(&self, table: &str) -> Result<u64> {
        CallLog::bump(&self.calls.row_count);
        let fixture = self.fixture(table)?;
        // An explicit count wins so scenarios can diverge without listing rows
        if fixture.table.row_count > 0 {
            Ok(fixture.table.row_count)
        } else {
            Ok(fixture.rows.len() as u64)
        }
    }

    async fn fetch_columns(&self, table: &str) -> Result<Vec<Column>> {
        CallLog::bump(&self.calls.columns);
        Ok(self.fixture(table)?.table.columns.values().cloned().collect())
    }

    async fn fetch_key_values(&self, table: &str, key: &KeyColumn) -> Result<Vec<KeyValue>> {
        CallLog::bump(&self.calls.key_values);
        let fixture = self.fixture(table)?;
        let index = Self::key_index(fixture, key)?;

        let mut values: Vec<KeyValue> = fixture
            .rows
            .iter()
            .filter_map(|row| row.get(index).cloned().flatten().map(KeyValue))
            .collect();
        values.sort();
        Ok(values)
    }

    async fn fetch_row(
        &self,
        table: &str,
        key: &KeyColumn,
        columns: &[String],
        value: &KeyValue,
    ) -> Result<Option<Row>> {
        CallLog::bump(&self.calls.rows);
        let fixture = self.fixture(table)?;
        let index = Self::key_index(fixture, key)?;

        let positions = columns
            .iter()
            .map(|name| {
                fixture.table.column_index(name).ok_or_else(|| {
                    Error::DatabaseError(format!("column '{}' missing from '{}'", name, table))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(fixture
            .rows
            .iter()
            .find(|row| row.get(index).and_then(|v| v.as_deref()) == Some(value.as_str()))
            .map(|row| {
                positions
                    .iter()
                    .map(|&i| row.get(i).cloned().flatten())
                    .collect()
            }))
    }

    async fn fetch_sequence(&self, sequence: &str) -> Result<Option<SequenceDescriptor>> {
        CallLog::bump(&self.calls.sequences);
        Ok(self.sequences.get(sequence).cloned())
    }
}
