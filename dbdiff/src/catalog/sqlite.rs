//! SQLite catalog backend
//!
//! Reads `sqlite_master` and the table-valued pragma functions. SQLite has no
//! sequences, so the sequence list is always empty.

use async_trait::async_trait;
use sqlx::{FromRow, Pool, Row as _, Sqlite};
use std::collections::HashMap;

use crate::catalog::types::{Column, ConstraintKind, KeyColumn, KeyValue, Row, SequenceDescriptor};
use crate::catalog::CatalogBackend;
use crate::error::Result;
use crate::utils::naming::{quote_ident, select_list, QuoteStyle};

#[derive(FromRow)]
struct NameRow {
    name: String,
}

#[derive(FromRow)]
struct PrimaryKeyRow {
    table_name: String,
    column_name: String,
    sql_type: String,
}

#[derive(FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    not_null: i64,
    column_default: Option<String>,
    key_position: i64,
}

#[derive(FromRow)]
struct ConstraintRow {
    column_name: Option<String>,
    constraint_type: String,
}

/// SQLite backend over the `main` database
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
}

impl SqliteBackend {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogBackend for SqliteBackend {
    fn driver(&self) -> &str {
        "sqlite"
    }

    async fn fetch_table_names(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;

        let rows = sqlx::query_as::<_, NameRow>(sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    async fn fetch_sequence_names(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn fetch_primary_keys(&self) -> Result<Vec<(String, KeyColumn)>> {
        let sql = r#"
            SELECT m.name AS table_name, p.name AS column_name, p.type AS sql_type
            FROM sqlite_master m
            JOIN pragma_table_info(m.name) p
            WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' AND p.pk > 0
            ORDER BY m.name, p.pk
        "#;

        let rows = sqlx::query_as::<_, PrimaryKeyRow>(sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.table_name,
                    KeyColumn {
                        name: r.column_name,
                        sql_type: r.sql_type,
                    },
                )
            })
            .collect())
    }

    async fn fetch_row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT count(*) FROM {}", quote_ident(table, QuoteStyle::Ansi));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_columns(&self, table: &str) -> Result<Vec<Column>> {
        let sql = r#"
            SELECT
                name AS column_name,
                type AS data_type,
                "notnull" AS not_null,
                dflt_value AS column_default,
                pk AS key_position
            FROM pragma_table_info(?)
            ORDER BY cid
        "#;

        let column_rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let sql = r#"
            SELECT ii.name AS column_name, 'UNIQUE' AS constraint_type
            FROM pragma_index_list(?) il
            JOIN pragma_index_info(il.name) ii
            WHERE il."unique" = 1 AND il.origin = 'u'
            UNION ALL
            SELECT "from" AS column_name, 'FOREIGN KEY' AS constraint_type
            FROM pragma_foreign_key_list(?)
        "#;

        let constraint_rows = sqlx::query_as::<_, ConstraintRow>(sql)
            .bind(table)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut kinds: HashMap<String, ConstraintKind> = HashMap::new();
        for row in constraint_rows {
            if let Some(column_name) = row.column_name {
                let kind = ConstraintKind::from_catalog(&row.constraint_type);
                let entry = kinds.entry(column_name).or_default();
                *entry = entry.strongest(kind);
            }
        }

        Ok(column_rows
            .into_iter()
            .map(|col| {
                let mut constraint = kinds.get(&col.column_name).copied().unwrap_or_default();
                if col.key_position > 0 {
                    constraint = ConstraintKind::PrimaryKey;
                }
                Column {
                    name: col.column_name,
                    data_type: col.data_type,
                    nullable: col.not_null == 0,
                    default: col.column_default,
                    constraint,
                }
            })
            .collect())
    }

    async fn fetch_key_values(&self, table: &str, key: &KeyColumn) -> Result<Vec<KeyValue>> {
        let column = quote_ident(&key.name, QuoteStyle::Ansi);
        let sql = format!(
            "SELECT CAST({column} AS TEXT) FROM {} ORDER BY {column}",
            quote_ident(table, QuoteStyle::Ansi),
        );

        let values: Vec<Option<String>> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(values.into_iter().flatten().map(KeyValue).collect())
    }

    async fn fetch_row(
        &self,
        table: &str,
        key: &KeyColumn,
        columns: &[String],
        value: &KeyValue,
    ) -> Result<Option<Row>> {
        // Column affinity converts the bound text for numeric keys
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            select_list(columns, QuoteStyle::Ansi, |c| format!("CAST({} AS TEXT)", c)),
            quote_ident(table, QuoteStyle::Ansi),
            quote_ident(&key.name, QuoteStyle::Ansi),
        );

        let row = sqlx::query(&sql)
            .bind(value.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut values = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    values.push(row.try_get::<Option<String>, _>(i)?);
                }
                Ok(Some(values))
            }
            None => Ok(None),
        }
    }

    async fn fetch_sequence(&self, _sequence: &str) -> Result<Option<SequenceDescriptor>> {
        Ok(None)
    }
}
