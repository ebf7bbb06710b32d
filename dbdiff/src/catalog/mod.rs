//! Catalog module for dbdiff
//!
//! This module defines what the comparison engine needs to know about a
//! database ([`CatalogProvider`]), the uncached query seam drivers implement
//! ([`CatalogBackend`]), and [`DatabaseCatalog`], which joins the two and
//! remembers the metadata that must only be fetched once.
//!
//! Composite primary keys are not modeled: a table whose key spans several
//! columns is treated as having no primary key.

pub mod memory;
pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod types;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

pub use memory::{CallCounts, CallLog, InMemoryBackend, TableFixture};
pub use mysql::MySqlBackend;
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;
pub use types::{Column, ConstraintKind, KeyColumn, KeyValue, Row, SequenceDescriptor, Table};

/// Read-only view of one database, as consumed by the comparators
///
/// Every operation is idempotent. Name and primary-key lookups may be
/// memoized; counts, key sets and rows are always read fresh.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// All user tables of the default schema, in lexicographic order
    async fn table_names(&self) -> Result<Vec<String>>;

    /// All sequences of the default schema, in lexicographic order
    async fn sequence_names(&self) -> Result<Vec<String>>;

    async fn table_row_count(&self, name: &str) -> Result<u64>;

    /// Column definitions of a table, without data
    async fn table_columns(&self, name: &str) -> Result<Vec<Column>>;

    /// The table's primary-key column, `None` when the key is absent or composite
    async fn primary_key_column(&self, name: &str) -> Result<Option<String>>;

    /// Every primary-key value of a table, in ascending key order
    async fn primary_key_values(&self, name: &str) -> Result<Vec<KeyValue>>;

    /// The row with primary-key value `key`, in declared column order
    async fn row_by_primary_key(&self, name: &str, key: &KeyValue) -> Result<Option<Row>>;

    /// The row with primary-key value `key`, holding exactly `columns` in that order
    async fn row_columns_by_primary_key(
        &self,
        name: &str,
        key: &KeyValue,
        columns: &[String],
    ) -> Result<Option<Row>>;

    async fn sequence_descriptor(&self, name: &str) -> Result<SequenceDescriptor>;
}

/// Backend-specific introspection queries, without any caching
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Driver identifier used in logs (e.g. "postgres")
    fn driver(&self) -> &str;

    async fn fetch_table_names(&self) -> Result<Vec<String>>;

    async fn fetch_sequence_names(&self) -> Result<Vec<String>>;

    /// One `(table, column)` entry per primary-key column of every table
    async fn fetch_primary_keys(&self) -> Result<Vec<(String, KeyColumn)>>;

    async fn fetch_row_count(&self, table: &str) -> Result<u64>;

    /// Columns in declared order; every primary-key member reports `PrimaryKey`
    async fn fetch_columns(&self, table: &str) -> Result<Vec<Column>>;

    async fn fetch_key_values(&self, table: &str, key: &KeyColumn) -> Result<Vec<KeyValue>>;

    /// Select `columns` of the row whose key equals `value`, every value as text
    async fn fetch_row(
        &self,
        table: &str,
        key: &KeyColumn,
        columns: &[String],
        value: &KeyValue,
    ) -> Result<Option<Row>>;

    async fn fetch_sequence(&self, sequence: &str) -> Result<Option<SequenceDescriptor>>;
}

/// A [`CatalogProvider`] over a backend, fetching names and keys at most once
pub struct DatabaseCatalog<B> {
    backend: B,
    table_names: OnceCell<Vec<String>>,
    sequence_names: OnceCell<Vec<String>>,
    primary_keys: OnceCell<HashMap<String, KeyColumn>>,
}

impl<B: CatalogBackend> DatabaseCatalog<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            table_names: OnceCell::new(),
            sequence_names: OnceCell::new(),
            primary_keys: OnceCell::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn tables(&self) -> Result<&Vec<String>> {
        self.table_names
            .get_or_try_init(|| async {
                let mut names = self.backend.fetch_table_names().await?;
                names.sort();
                names.dedup();
                tracing::debug!(driver = self.backend.driver(), count = names.len(), "Fetched table names");
                Ok::<_, Error>(names)
            })
            .await
    }

    async fn sequences(&self) -> Result<&Vec<String>> {
        self.sequence_names
            .get_or_try_init(|| async {
                let mut names = self.backend.fetch_sequence_names().await?;
                names.sort();
                names.dedup();
                tracing::debug!(driver = self.backend.driver(), count = names.len(), "Fetched sequence names");
                Ok::<_, Error>(names)
            })
            .await
    }

    async fn keys(&self) -> Result<&HashMap<String, KeyColumn>> {
        self.primary_keys
            .get_or_try_init(|| async {
                let mut grouped: HashMap<String, Vec<KeyColumn>> = HashMap::new();
                for (table, column) in self.backend.fetch_primary_keys().await? {
                    grouped.entry(table).or_default().push(column);
                }

                let keys = grouped
                    .into_iter()
                    .filter_map(|(table, mut columns)| {
                        if columns.len() == 1 {
                            columns.pop().map(|column| (table, column))
                        } else {
                            None
                        }
                    })
                    .collect::<HashMap<_, _>>();
                Ok::<_, Error>(keys)
            })
            .await
    }

    async fn ensure_table(&self, name: &str) -> Result<()> {
        if self.tables().await?.binary_search_by(|t| t.as_str().cmp(name)).is_ok() {
            Ok(())
        } else {
            Err(Error::NotFound(format!("table '{}'", name)))
        }
    }

    async fn key_column(&self, name: &str) -> Result<&KeyColumn> {
        self.ensure_table(name).await?;
        self.keys()
            .await?
            .get(name)
            .ok_or_else(|| Error::NoPrimaryKey(name.to_string()))
    }
}

#[async_trait]
impl<B: CatalogBackend> CatalogProvider for DatabaseCatalog<B> {
    async fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables().await?.clone())
    }

    async fn sequence_names(&self) -> Result<Vec<String>> {
        Ok(self.sequences().await?.clone())
    }

    async fn table_row_count(&self, name: &str) -> Result<u64> {
        self.ensure_table(name).await?;
        self.backend.fetch_row_count(name).await
    }

    async fn table_columns(&self, name: &str) -> Result<Vec<Column>> {
        self.ensure_table(name).await?;
        let mut columns = self.backend.fetch_columns(name).await?;

        // Only a sole key column keeps the primary-key kind
        if columns.iter().filter(|c| c.is_primary()).count() > 1 {
            for column in columns.iter_mut().filter(|c| c.is_primary()) {
                column.constraint = ConstraintKind::None;
            }
        }
        Ok(columns)
    }

    async fn primary_key_column(&self, name: &str) -> Result<Option<String>> {
        self.ensure_table(name).await?;
        Ok(self.keys().await?.get(name).map(|k| k.name.clone()))
    }

    async fn primary_key_values(&self, name: &str) -> Result<Vec<KeyValue>> {
        let key = self.key_column(name).await?;
        self.backend.fetch_key_values(name, key).await
    }

    async fn row_by_primary_key(&self, name: &str, key: &KeyValue) -> Result<Option<Row>> {
        let column = self.key_column(name).await?;
        let columns: Vec<String> = self
            .backend
            .fetch_columns(name)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        self.backend.fetch_row(name, column, &columns, key).await
    }

    async fn row_columns_by_primary_key(
        &self,
        name: &str,
        key: &KeyValue,
        columns: &[String],
    ) -> Result<Option<Row>> {
        let column = self.key_column(name).await?;
        self.backend.fetch_row(name, column, columns, key).await
    }

    async fn sequence_descriptor(&self, name: &str) -> Result<SequenceDescriptor> {
        self.backend
            .fetch_sequence(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sequence '{}'", name)))
    }
}
